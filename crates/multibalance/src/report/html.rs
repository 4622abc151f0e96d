use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::report::plots::{plot_relabeling, plot_summary};
use crate::report::summary::{GroupSummary, Summary};

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{:.4}", x))
}

fn group_table(classes: &[String], group: &GroupSummary) -> Markup {
    html! {
        h3 { "Group " (group.name) " (n = " (group.n_samples) ")" }
        table class="summary" {
            thead {
                tr { th { "class" } th { "prior" } th { "error (original)" } th { "error (adjusted)" } }
            }
            tbody {
                @for (i, class) in classes.iter().enumerate() {
                    tr {
                        td { (class) }
                        td { (format!("{:.4}", group.class_priors[i])) }
                        td { (fmt_opt(group.error_before[i])) }
                        td { (fmt_opt(group.error_after.as_ref().and_then(|e| e[i]))) }
                    }
                }
            }
        }
    }
}

/// Self-contained HTML page: headline numbers, per-group tables, the charts
/// from `report::plots`, and the raw summary as JSON.
pub fn render_report(summary: &Summary, title: &str) -> anyhow::Result<String> {
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let json = serde_json::to_string_pretty(summary)?;

    let mut charts = vec![plot_summary(summary).to_inline_html(Some("recall-by-group"))];
    for (i, plot) in plot_relabeling(summary).iter().enumerate() {
        charts.push(plot.to_inline_html(Some(&format!("relabeling-{}", i))));
    }

    let page = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
                script src="https://cdn.plot.ly/plotly-2.12.1.min.js" {}
                style {
                    "body { font-family: sans-serif; margin: 2em; }
                     table.summary { border-collapse: collapse; margin-bottom: 1em; }
                     table.summary td, table.summary th { border: 1px solid #ccc; padding: 4px 8px; text-align: right; }
                     pre { background-color: #f5f5f5; padding: 10px; border-radius: 5px; overflow-x: auto; }"
                }
            }
            body {
                h1 { (title) }
                p { "Generated " (generated) }
                h2 { "Overview" }
                ul {
                    li { "Samples: " (summary.n_samples) }
                    li { "Classes: " (summary.classes.join(", ")) }
                    @if let Some(adj) = &summary.adjustment {
                        li { "Goal: " (adj.goal.name()) ", loss: " (adj.loss.name()) }
                        li { (format!("Loss {:.4} (original {:.4})", summary.objective, summary.baseline_objective)) }
                        li { (format!("Accuracy {:.4} -> {}", summary.accuracy_before, fmt_opt(summary.accuracy_after))) }
                        li { (format!("Max group disparity {:.4} -> {:.2e}", adj.fairness.disparity_before, adj.fairness.disparity_after)) }
                    } @else {
                        li { (format!("Unadjusted 0/1 loss {:.4}", summary.objective)) }
                    }
                }
                @if !summary.zero_support.is_empty() {
                    h2 { "Excluded classes" }
                    ul {
                        @for z in &summary.zero_support {
                            li { "class " (z.class) " has no samples in group " (z.group) }
                        }
                    }
                }
                h2 { "Groups" }
                @for group in &summary.groups {
                    (group_table(&summary.classes, group))
                }
                h2 { "Charts" }
                @for chart in &charts {
                    div { (PreEscaped(chart)) }
                }
                h2 { "Summary (JSON)" }
                pre { code { (json) } }
            }
        }
    };
    Ok(page.into_string())
}
