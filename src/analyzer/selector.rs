use crate::types::{ClassProbabilities, Label, Labels};

/// Turns classifier scores into the set of labels reported for a tick.
///
/// Every label scoring at or above the threshold is reported, most probable
/// first. "Normal" is dropped when anything else also qualifies, and an empty
/// selection falls back to `["Normal"]`, so the result is never empty.
#[derive(Debug, Clone, Copy)]
pub struct AnomalySelector {
    threshold: f64,
}

impl Default for AnomalySelector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl AnomalySelector {
    pub const DEFAULT_THRESHOLD: f64 = 0.15;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn select(&self, probabilities: &ClassProbabilities) -> Labels {
        let mut ranked: Vec<_> = probabilities.iter().collect();
        // stable: ties keep canonical label order
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        let mut labels: Labels = ranked
            .into_iter()
            .filter(|p| p.probability >= self.threshold)
            .map(|p| p.label.clone())
            .collect();

        if labels.len() > 1 && labels.iter().any(Label::is_normal) {
            labels.retain(|l| !l.is_normal());
        }
        if labels.is_empty() {
            labels.push(Label::normal());
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(entries: &[(&str, f64)]) -> ClassProbabilities {
        ClassProbabilities::new(entries.iter().map(|(l, p)| (Label::from(*l), *p)))
    }

    fn names(labels: &Labels) -> Vec<&str> {
        labels.iter().map(Label::as_str).collect()
    }

    #[test]
    fn drops_normal_and_sub_threshold_labels() {
        let p = probs(&[
            ("Normal", 0.10),
            ("Overheating", 0.60),
            ("Misalignment", 0.20),
            ("Other", 0.10),
        ]);
        assert_eq!(names(&AnomalySelector::default().select(&p)), vec!["Overheating", "Misalignment"]);
    }

    #[test]
    fn confident_normal_stays_normal() {
        let p = probs(&[("Normal", 0.90), ("Overheating", 0.05), ("Misalignment", 0.05)]);
        assert_eq!(names(&AnomalySelector::default().select(&p)), vec!["Normal"]);
    }

    #[test]
    fn normal_removed_when_it_qualifies_alongside_others() {
        let p = probs(&[("Normal", 0.55), ("Bearing Failure", 0.30), ("Misalignment", 0.15)]);
        assert_eq!(
            names(&AnomalySelector::default().select(&p)),
            vec!["Bearing Failure", "Misalignment"]
        );
    }

    #[test]
    fn everything_below_threshold_yields_normal() {
        let p = probs(&[
            ("Bearing Failure", 0.14),
            ("Excessive Load", 0.14),
            ("Loose Components", 0.14),
            ("Misalignment", 0.14),
            ("Motor Overheating", 0.14),
            ("Normal", 0.14),
        ]);
        assert_eq!(names(&AnomalySelector::default().select(&p)), vec!["Normal"]);
    }

    #[test]
    fn empty_distribution_yields_normal() {
        let labels = AnomalySelector::default().select(&ClassProbabilities::default());
        assert_eq!(names(&labels), vec!["Normal"]);
    }

    #[test]
    fn ties_keep_canonical_order() {
        let p = probs(&[("Excessive Load", 0.3), ("Bearing Failure", 0.4), ("Misalignment", 0.3)]);
        assert_eq!(
            names(&AnomalySelector::default().select(&p)),
            vec!["Bearing Failure", "Excessive Load", "Misalignment"]
        );
    }

    #[test]
    fn threshold_is_inclusive_and_configurable() {
        let p = probs(&[("Normal", 0.7), ("Misalignment", 0.3)]);
        assert_eq!(names(&AnomalySelector::new(0.3).select(&p)), vec!["Misalignment"]);
        assert_eq!(names(&AnomalySelector::new(0.31).select(&p)), vec!["Normal"]);
    }

    #[test]
    fn nan_scores_are_never_selected() {
        let p = probs(&[("Normal", f64::NAN), ("Misalignment", 0.2)]);
        assert_eq!(names(&AnomalySelector::default().select(&p)), vec!["Misalignment"]);
    }
}
