//! Per-tag detection history bounded by count and age.

use std::collections::{HashMap, VecDeque};

use log::trace;
use tag_anchor_core::{Detection, TagId};

use crate::SmoothingParams;

/// Insertion-ordered detections per tag.
#[derive(Clone, Debug)]
pub struct DetectionAccumulator {
    max_detections: usize,
    max_age: Option<f64>,
    queues: HashMap<TagId, VecDeque<Detection>>,
}

impl DetectionAccumulator {
    /// `max_age` of `None` disables staling. A cap of zero is treated as one.
    pub fn new(max_detections: usize, max_age: Option<f64>) -> Self {
        Self {
            max_detections: max_detections.max(1),
            max_age,
            queues: HashMap::new(),
        }
    }

    pub fn from_params(params: &SmoothingParams) -> Self {
        Self::new(params.max_detections, params.staling.then_some(params.max_age))
    }

    #[inline]
    pub fn max_detections(&self) -> usize {
        self.max_detections
    }

    #[inline]
    pub fn max_age(&self) -> Option<f64> {
        self.max_age
    }

    /// Add one detection. Stale entries for the same tag are dropped first,
    /// then the oldest ones while the queue is over its cap.
    pub fn insert(&mut self, detection: Detection, now: f64) {
        let max_age = self.max_age;
        let queue = self.queues.entry(detection.tag_id()).or_default();
        if let Some(max_age) = max_age {
            evict_stale(queue, now, max_age);
        }
        queue.push_back(detection);
        while queue.len() > self.max_detections {
            queue.pop_front();
        }
    }

    /// Add a batch and return the distinct tag ids it contained, in first-seen
    /// order.
    pub fn extend<I>(&mut self, detections: I, now: f64) -> Vec<TagId>
    where
        I: IntoIterator<Item = Detection>,
    {
        let mut observed = Vec::new();
        for detection in detections {
            let id = detection.tag_id();
            if !observed.contains(&id) {
                observed.push(id);
            }
            self.insert(detection, now);
        }
        observed
    }

    /// Drop stale entries across all tags; tags left without detections are
    /// forgotten. Returns the number of detections removed.
    pub fn purge_stale(&mut self, now: f64) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let mut removed = 0;
        self.queues.retain(|id, queue| {
            let n = evict_stale(queue, now, max_age);
            if n > 0 {
                trace!("tag {id}: {n} stale detection(s) dropped");
            }
            removed += n;
            !queue.is_empty()
        });
        removed
    }

    pub fn detections(&self, tag_id: TagId) -> Option<&VecDeque<Detection>> {
        self.queues.get(&tag_id)
    }

    pub fn len(&self, tag_id: TagId) -> usize {
        self.queues.get(&tag_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagId, &VecDeque<Detection>)> {
        self.queues.iter().map(|(id, q)| (*id, q))
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

fn evict_stale(queue: &mut VecDeque<Detection>, now: f64, max_age: f64) -> usize {
    let mut n = 0;
    while queue
        .front()
        .is_some_and(|d| now - d.capture_timestamp() > max_age)
    {
        queue.pop_front();
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    fn det(tag_id: TagId, t: f64) -> Detection {
        Detection::new(
            tag_id,
            Vector3::new(t, 0.0, 0.0),
            UnitQuaternion::identity(),
            t,
            0,
        )
    }

    #[test]
    fn queue_never_exceeds_cap() {
        let mut acc = DetectionAccumulator::new(3, None);
        for i in 0..10 {
            acc.insert(det(1, i as f64), i as f64);
            assert!(acc.len(1) <= 3);
        }
        let kept: Vec<f64> = acc
            .detections(1)
            .unwrap()
            .iter()
            .map(|d| d.capture_timestamp())
            .collect();
        assert_eq!(kept, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn stale_entries_are_dropped_before_insert() {
        let mut acc = DetectionAccumulator::new(100, Some(2.0));
        acc.insert(det(1, 0.0), 0.0);
        acc.insert(det(1, 1.0), 1.0);
        acc.insert(det(1, 3.0), 3.0);
        // 0.0 is 3 s old; 1.0 sits exactly on the limit and stays
        let kept: Vec<f64> = acc
            .detections(1)
            .unwrap()
            .iter()
            .map(|d| d.capture_timestamp())
            .collect();
        assert_eq!(kept, vec![1.0, 3.0]);
    }

    #[test]
    fn staling_disabled_keeps_everything() {
        let mut acc = DetectionAccumulator::new(100, None);
        acc.insert(det(1, 0.0), 0.0);
        acc.insert(det(1, 100.0), 100.0);
        assert_eq!(acc.len(1), 2);
        assert_eq!(acc.purge_stale(1000.0), 0);
        assert_eq!(acc.len(1), 2);
    }

    #[test]
    fn purge_forgets_tags_without_detections() {
        let mut acc = DetectionAccumulator::new(100, Some(1.0));
        acc.extend([det(1, 0.0), det(2, 0.5)], 0.5);
        assert_eq!(acc.purge_stale(1.2), 1);
        assert!(acc.detections(1).is_none());
        assert_eq!(acc.len(2), 1);
        assert_eq!(acc.purge_stale(5.0), 1);
        assert!(acc.is_empty());
    }

    #[test]
    fn extend_reports_distinct_ids_in_order() {
        let mut acc = DetectionAccumulator::new(10, None);
        let ids = acc.extend([det(4, 0.0), det(2, 0.0), det(4, 0.1)], 0.1);
        assert_eq!(ids, vec![4, 2]);
        assert_eq!(acc.len(4), 2);
        assert_eq!(acc.len(2), 1);
    }
}
