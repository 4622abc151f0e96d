//! Integration tests for the guarantees of a successful `adjust`: stochastic
//! relabelings, equalized rates for each goal, and optimality on inputs with
//! a known answer.

use multibalance::{
    BalanceConfig, FairnessGoal, LossAggregation, MulticlassBalancer, RelabelingMatrix, SolverConfig,
    Summary,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EPS: f64 = 1e-6;

type Labels = (Vec<String>, Vec<String>, Vec<String>);

/// Expand per-group count tables `counts[i][j]` (true `i`, predicted `j`)
/// into label sequences.
fn from_counts(classes: &[&str], groups: &[(&str, Vec<Vec<usize>>)]) -> Labels {
    let (mut y, mut y_hat, mut a) = (Vec::new(), Vec::new(), Vec::new());
    for (group, table) in groups {
        for (i, row) in table.iter().enumerate() {
            for (j, &n) in row.iter().enumerate() {
                for _ in 0..n {
                    y.push(classes[i].to_string());
                    y_hat.push(classes[j].to_string());
                    a.push(group.to_string());
                }
            }
        }
    }
    (y, y_hat, a)
}

/// Three groups with different accuracy, every class present everywhere.
fn random_three_class(seed: u64) -> Labels {
    let classes = ["high", "low", "medium"];
    let groups = [("g1", 0.8), ("g2", 0.6), ("g3", 0.45)];
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut y, mut y_hat, mut a) = (Vec::new(), Vec::new(), Vec::new());
    for (name, accuracy) in groups {
        for n in 0..300 {
            let truth = n % 3;
            let pred = if rng.gen::<f64>() < accuracy {
                truth
            } else {
                rng.gen_range(0..3)
            };
            y.push(classes[truth].to_string());
            y_hat.push(classes[pred].to_string());
            a.push(name.to_string());
        }
    }
    (y, y_hat, a)
}

/// `n_classes` classes over `n_groups` groups with skewed class priors,
/// uneven group sizes (some only a handful of samples) and per-group
/// accuracy. Every class occurs as a true label in the first group.
fn random_skewed(seed: u64, n_classes: usize, n_groups: usize) -> Labels {
    let mut rng = StdRng::seed_from_u64(seed);
    let classes: Vec<String> = (0..n_classes).map(|i| format!("c{}", i)).collect();
    let (mut y, mut y_hat, mut a) = (Vec::new(), Vec::new(), Vec::new());
    for g in 0..n_groups {
        let name = format!("g{}", g);
        let weights: Vec<f64> = (0..n_classes)
            .map(|_| rng.gen::<f64>().powi(3) + 0.02)
            .collect();
        let total: f64 = weights.iter().sum();
        let size = if rng.gen_bool(0.3) {
            rng.gen_range(3..12)
        } else {
            rng.gen_range(30..120)
        };
        let accuracy = rng.gen_range(0.3..0.95);
        for _ in 0..size {
            let mut u = rng.gen::<f64>() * total;
            let mut truth = n_classes - 1;
            for (i, w) in weights.iter().enumerate() {
                if u < *w {
                    truth = i;
                    break;
                }
                u -= w;
            }
            let pred = if rng.gen::<f64>() < accuracy {
                truth
            } else {
                rng.gen_range(0..n_classes)
            };
            y.push(classes[truth].clone());
            y_hat.push(classes[pred].clone());
            a.push(name.clone());
        }
    }
    for class in &classes {
        y.push(class.clone());
        y_hat.push(class.clone());
        a.push("g0".to_string());
    }
    (y, y_hat, a)
}

fn balancer(labels: &Labels) -> MulticlassBalancer {
    let _ = env_logger::builder().is_test(true).try_init();
    MulticlassBalancer::new(&labels.0, &labels.1, &labels.2).expect("valid samples")
}

fn assert_stochastic(t: &RelabelingMatrix) {
    for j in 0..t.n_classes() {
        let row = t.row(j);
        assert!((row.sum() - 1.0).abs() < EPS, "row {} sums to {}", j, row.sum());
        assert!(row.iter().all(|&v| v >= -EPS), "row {} has negative entries", j);
    }
}

fn adjusted_rates(summary: &Summary, group: &str) -> Vec<Vec<f64>> {
    summary
        .group(group)
        .and_then(|g| g.adjusted_rates.clone())
        .expect("adjusted summary")
}

/// `P(adjusted = k | a)` from the class priors and conditional rates.
fn adjusted_marginal(summary: &Summary, group: &str) -> Vec<f64> {
    let g = summary.group(group).unwrap();
    let rates = g.adjusted_rates.as_ref().unwrap();
    let k = summary.classes.len();
    (0..k)
        .map(|adj| (0..k).map(|i| g.class_priors[i] * rates[i][adj]).sum())
        .collect()
}

// ---------------------------------------------------------------------------
// Stochastic relabelings
// ---------------------------------------------------------------------------

#[test]
fn every_goal_and_loss_yields_stochastic_matrices() {
    let labels = random_three_class(11);
    let mut b = balancer(&labels);
    for goal in FairnessGoal::ALL {
        for loss in LossAggregation::ALL {
            b.adjust(goal, loss).expect("adjust succeeds");
            let result = b.result().unwrap();
            assert_eq!(result.relabelings.len(), 3);
            result.relabelings.iter().for_each(assert_stochastic);
            assert!(result.feasible);
        }
    }
}

#[test]
fn randomized_inputs_always_admit_a_fair_rule() {
    for seed in 0..20u64 {
        let n_classes = 2 + (seed % 5) as usize;
        let n_groups = 2 + (seed / 5 % 4) as usize;
        let labels = random_skewed(1000 + seed, n_classes, n_groups);
        let mut b = balancer(&labels);
        for goal in FairnessGoal::ALL {
            for loss in LossAggregation::ALL {
                let case = format!("seed {} K={} G={} {}/{}", seed, n_classes, n_groups, goal, loss);
                b.adjust(goal, loss)
                    .unwrap_or_else(|e| panic!("{}: {}", case, e));
                let result = b.result().unwrap();
                assert_eq!(result.relabelings.len(), n_groups, "{}", case);
                result.relabelings.iter().for_each(assert_stochastic);
                assert!(result.objective.is_finite(), "{}", case);
                let fairness = b.summary().adjustment.unwrap().fairness;
                assert!(fairness.satisfied, "{}: disparity {}", case, fairness.disparity_after);
            }
        }
    }
}

#[test]
fn randomized_inputs_solve_without_tie_break() {
    let config = |goal, loss| {
        BalanceConfig::new(goal, loss).with_solver(SolverConfig {
            tie_break: 0.0,
            ..SolverConfig::default()
        })
    };
    for seed in [4u64, 9, 14, 19] {
        let labels = random_skewed(2000 + seed, 6, 2 + (seed / 5) as usize);
        let mut b = balancer(&labels);
        for goal in FairnessGoal::ALL {
            b.adjust_with(&config(goal, LossAggregation::Macro))
                .unwrap_or_else(|e| panic!("seed {} {}: {}", seed, goal, e));
            b.result().unwrap().relabelings.iter().for_each(assert_stochastic);
            assert!(b.summary().adjustment.unwrap().fairness.satisfied);
        }
    }
}

// ---------------------------------------------------------------------------
// Goal-specific equalities
// ---------------------------------------------------------------------------

#[test]
fn odds_equalizes_class_conditional_rates() {
    let labels = random_three_class(3);
    let mut b = balancer(&labels);
    b.adjust(FairnessGoal::Odds, LossAggregation::Macro).unwrap();
    let summary = b.summary();

    let reference = adjusted_rates(&summary, "g1");
    for group in ["g2", "g3"] {
        let rates = adjusted_rates(&summary, group);
        for i in 0..3 {
            for k in 0..3 {
                assert!(
                    (rates[i][k] - reference[i][k]).abs() < EPS,
                    "{} differs at ({}, {})",
                    group,
                    i,
                    k
                );
            }
        }
    }
    let fairness = &summary.adjustment.as_ref().unwrap().fairness;
    assert!(fairness.satisfied);
    assert!(fairness.disparity_before > fairness.disparity_after);
}

#[test]
fn strict_equalizes_output_distribution() {
    let labels = random_three_class(5);
    let mut b = balancer(&labels);
    b.adjust(FairnessGoal::Strict, LossAggregation::Micro).unwrap();
    let summary = b.summary();

    let reference = adjusted_marginal(&summary, "g1");
    for group in ["g2", "g3"] {
        let marginal = adjusted_marginal(&summary, group);
        for k in 0..3 {
            assert!((marginal[k] - reference[k]).abs() < EPS);
        }
    }
    assert!(summary.adjustment.unwrap().fairness.satisfied);
}

#[test]
fn opportunity_equalizes_only_the_diagonal() {
    let labels = random_three_class(9);
    let mut b = balancer(&labels);
    b.adjust(FairnessGoal::Opportunity, LossAggregation::Macro).unwrap();
    let summary = b.summary();

    let reference = adjusted_rates(&summary, "g1");
    for group in ["g2", "g3"] {
        let rates = adjusted_rates(&summary, group);
        for i in 0..3 {
            assert!((rates[i][i] - reference[i][i]).abs() < EPS);
        }
    }
    // The looser goal can never cost more than equalized odds.
    let opportunity_loss = b.result().unwrap().objective;
    b.adjust(FairnessGoal::Odds, LossAggregation::Macro).unwrap();
    assert!(opportunity_loss <= b.result().unwrap().objective + EPS);
}

// ---------------------------------------------------------------------------
// Known optima
// ---------------------------------------------------------------------------

fn identical_groups() -> Labels {
    let table = vec![vec![40, 5, 5], vec![4, 42, 4], vec![3, 3, 44]];
    from_counts(
        &["a", "b", "c"],
        &[("x", table.clone()), ("y", table.clone()), ("z", table)],
    )
}

#[test]
fn identical_groups_keep_the_identity_rule() {
    let labels = identical_groups();
    let mut b = balancer(&labels);
    for goal in [FairnessGoal::Odds, FairnessGoal::Strict] {
        for loss in LossAggregation::ALL {
            let result = b.adjust(goal, loss).unwrap();
            for t in &result.relabelings {
                assert!(t.distance_from_identity() < EPS, "{} / {}", goal, loss);
            }
            assert!((result.objective - result.baseline_objective).abs() < EPS);
        }
    }
}

#[test]
fn single_group_needs_no_adjustment() {
    let labels = from_counts(
        &["a", "b", "c"],
        &[("only", vec![vec![30, 8, 2], vec![6, 25, 9], vec![1, 7, 32]])],
    );
    let mut b = balancer(&labels);
    for goal in FairnessGoal::ALL {
        let result = b.adjust(goal, LossAggregation::Micro).unwrap();
        assert!(result.relabelings[0].distance_from_identity() < EPS);
        assert!((result.objective - result.baseline_objective).abs() < EPS);
    }
}

/// Group A: TPR 0.8 / FPR 0.1. Group B: TPR 0.6 / FPR 0.3. Equal priors and
/// group sizes.
fn two_group_binary() -> Labels {
    from_counts(
        &["neg", "pos"],
        &[
            ("A", vec![vec![45, 5], vec![10, 40]]),
            ("B", vec![vec![35, 15], vec![20, 30]]),
        ],
    )
}

/// Solve for the relabeling `(p, q) = (T[neg][pos], T[pos][pos])` that moves
/// a group with conditional rates `r` to operating point `(fpr, tpr)`.
fn relabeling_for(r: &[Vec<f64>], fpr: f64, tpr: f64) -> (f64, f64) {
    let (a, b, c, d) = (r[0][0], r[0][1], r[1][0], r[1][1]);
    let det = a * d - b * c;
    ((d * fpr - b * tpr) / det, (a * tpr - c * fpr) / det)
}

#[test]
fn binary_equalized_odds_matches_grid_search() {
    let labels = two_group_binary();
    let mut b = balancer(&labels);
    let raw = b.summary();
    let rates_a = raw.group("A").unwrap().original_rates.clone();
    let rates_b = raw.group("B").unwrap().original_rates.clone();

    let result = b.adjust(FairnessGoal::Odds, LossAggregation::Micro).unwrap();
    let lp_loss = result.objective;

    let summary = b.summary();
    for group in ["A", "B"] {
        let rates = adjusted_rates(&summary, group);
        assert!((rates[0][1] - 0.3).abs() < EPS, "{} FPR {}", group, rates[0][1]);
        assert!((rates[1][1] - 0.6).abs() < EPS, "{} TPR {}", group, rates[1][1]);
    }
    assert!((lp_loss - 0.35).abs() < EPS);

    // Both groups must share an operating point reachable by each of them.
    let feasible = |p: f64, q: f64| (-1e-9..=1.0 + 1e-9).contains(&p) && (-1e-9..=1.0 + 1e-9).contains(&q);
    let mut best = f64::INFINITY;
    for fi in 0..=100 {
        for ti in 0..=100 {
            let (fpr, tpr) = (fi as f64 / 100.0, ti as f64 / 100.0);
            let (pa, qa) = relabeling_for(&rates_a, fpr, tpr);
            let (pb, qb) = relabeling_for(&rates_b, fpr, tpr);
            if feasible(pa, qa) && feasible(pb, qb) {
                best = best.min(0.5 * fpr + 0.5 * (1.0 - tpr));
            }
        }
    }
    assert!(lp_loss <= best + EPS, "LP {} worse than grid {}", lp_loss, best);
    assert!((best - lp_loss).abs() < EPS);

    // Group A moves down to B's operating point; B keeps its predictions.
    let t_a = b.relabeling("A").unwrap();
    assert!((t_a.row(0)[1] - 9.0 / 35.0).abs() < EPS);
    assert!((t_a.row(1)[1] - 24.0 / 35.0).abs() < EPS);
    assert!(b.relabeling("B").unwrap().distance_from_identity() < EPS);
}

#[test]
fn custom_costs_change_the_optimum() {
    let labels = from_counts(&["neg", "pos"], &[("A", vec![vec![45, 5], vec![10, 40]])]);
    let mut b = balancer(&labels);

    // Missing a positive costs ten times a false alarm: every "neg"
    // prediction is cheaper relabeled as "pos".
    let config = BalanceConfig::new(FairnessGoal::Odds, LossAggregation::Micro)
        .with_cost(multibalance::CostMatrix(vec![vec![0.0, 1.0], vec![10.0, 0.0]]));
    let result = b.adjust_with(&config).unwrap();
    let t = &result.relabelings[0];
    assert!((t.row(0)[1] - 1.0).abs() < EPS);
    assert!((t.row(1)[1] - 1.0).abs() < EPS);
    assert!(result.objective < result.baseline_objective);
}

#[test]
fn missing_class_in_a_group_is_excluded_not_fatal() {
    let labels = from_counts(
        &["a", "b", "c"],
        &[
            ("x", vec![vec![20, 3, 2], vec![4, 18, 3], vec![2, 2, 21]]),
            ("y", vec![vec![15, 8, 2], vec![6, 14, 5], vec![0, 0, 0]]),
        ],
    );
    let mut b = balancer(&labels);
    let summary = b.summary();
    assert_eq!(summary.zero_support.len(), 1);
    assert_eq!(summary.zero_support[0].group, "y");
    assert_eq!(summary.zero_support[0].class, "c");
    assert_eq!(summary.group("y").unwrap().error_before[2], None);

    b.adjust(FairnessGoal::Odds, LossAggregation::Macro).unwrap();
    let summary = b.summary();
    let (rx, ry) = (adjusted_rates(&summary, "x"), adjusted_rates(&summary, "y"));
    for i in 0..2 {
        for k in 0..3 {
            assert!((rx[i][k] - ry[i][k]).abs() < EPS);
        }
    }
    assert_eq!(summary.zero_support.len(), 1);
}
