use crate::perception::types::AnchorMatch;

/// Greedy NMS: keep the best box, drop every remaining box whose IoU with it
/// exceeds `overlap`, repeat. Output is sorted by descending score.
pub fn non_max_suppression(mut candidates: Vec<AnchorMatch>, overlap: f32) -> Vec<AnchorMatch> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<AnchorMatch> = Vec::new();
    let mut remaining = candidates;
    while !remaining.is_empty() {
        let top = remaining.remove(0);
        remaining.retain(|other| top.iou(other) <= overlap);
        keep.push(top);
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(x: i32, y: i32, width: u32, height: u32, score: f32) -> AnchorMatch {
        AnchorMatch { x, y, width, height, score }
    }

    #[test]
    fn overlapping_boxes_keep_the_higher_score() {
        let low = hit(1, 0, 10, 10, 0.85);
        let high = hit(0, 0, 10, 10, 0.95);
        assert!(low.iou(&high) > 0.5);

        let kept = non_max_suppression(vec![low, high], 0.5);
        assert_eq!(kept, vec![high]);
    }

    #[test]
    fn boxes_at_the_threshold_both_survive() {
        let outer = hit(0, 0, 10, 10, 0.9);
        let inner = hit(0, 0, 10, 5, 0.8);
        assert!((outer.iou(&inner) - 0.5).abs() < f32::EPSILON);

        let kept = non_max_suppression(vec![inner, outer], 0.5);
        assert_eq!(kept, vec![outer, inner]);
    }

    #[test]
    fn suppression_chains_from_each_kept_box() {
        // b overlaps a, c overlaps b but not a: a and c survive.
        let a = hit(0, 0, 10, 10, 0.99);
        let b = hit(2, 0, 10, 10, 0.95);
        let c = hit(9, 0, 10, 10, 0.90);
        let kept = non_max_suppression(vec![c, b, a], 0.5);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(non_max_suppression(Vec::new(), 0.5).is_empty());
    }
}
