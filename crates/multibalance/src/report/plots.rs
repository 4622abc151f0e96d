use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, HeatMap, Plot};

use crate::report::summary::Summary;

/// Per-class recall (`P(correct | y = i, a)`) for every group, before and
/// after adjustment, as grouped bars.
pub fn plot_summary(summary: &Summary) -> Plot {
    let mut plot = Plot::new();

    for group in &summary.groups {
        let mut classes = Vec::new();
        let mut before = Vec::new();
        let mut after = Vec::new();
        for (i, class) in summary.classes.iter().enumerate() {
            let Some(err) = group.error_before[i] else {
                continue;
            };
            classes.push(class.clone());
            before.push(1.0 - err);
            if let Some(err_after) = group.error_after.as_ref().and_then(|e| e[i]) {
                after.push(1.0 - err_after);
            }
        }

        plot.add_trace(Bar::new(classes.clone(), before).name(&format!("{} (original)", group.name)));
        if group.error_after.is_some() {
            plot.add_trace(Bar::new(classes, after).name(&format!("{} (adjusted)", group.name)));
        }
    }

    let title = match &summary.adjustment {
        Some(adj) => format!(
            "Per-class recall by group, goal={} loss={}",
            adj.goal, adj.loss
        ),
        None => "Per-class recall by group (unadjusted)".to_string(),
    };

    plot.set_layout(
        Layout::new()
            .title(title.as_str())
            .bar_mode(BarMode::Group)
            .x_axis(Axis::new().title("True class"))
            .y_axis(Axis::new().title("P(correct | class, group)")),
    );
    plot
}

/// One heatmap per group of the solved relabeling matrix. Empty when the
/// summary describes the unadjusted state.
pub fn plot_relabeling(summary: &Summary) -> Vec<Plot> {
    summary
        .groups
        .iter()
        .filter_map(|group| {
            let matrix = group.relabeling.as_ref()?;
            let mut plot = Plot::new();
            plot.add_trace(HeatMap::new(
                summary.classes.clone(),
                summary.classes.clone(),
                matrix.clone(),
            ));
            plot.set_layout(
                Layout::new()
                    .title(format!("Relabeling for group '{}'", group.name).as_str())
                    .x_axis(Axis::new().title("Adjusted label"))
                    .y_axis(Axis::new().title("Original prediction")),
            );
            Some(plot)
        })
        .collect()
}
