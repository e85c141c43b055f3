//! Segments and segmentations
//!
//! A segment is a chunk of signal defined by its label, start and end
//! times (seconds) and an optional score. A segmentation is an ordered list
//! of segments; neighbours are reached by position, so the list cannot get
//! out of sync with itself.

mod label;
mod text;

pub use label::{label_equal, Label, NAME_SEPARATOR};
pub use text::{
    format_score, parse_line, read, read_file, write, write_file, FieldSelector, ParsedLine,
    COMMENT_CHAR,
};

use crate::error::SadResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    label: Option<Label>,
    start: Option<f64>,
    end: Option<f64>,
    score: Option<f64>,
}

impl Segment {
    /// Create a segment from its attributes. `label` is a `+`-separated list
    /// of names; it fails only when the text holds no name at all.
    pub fn new(
        label: Option<&str>,
        start: Option<f64>,
        end: Option<f64>,
        score: Option<f64>,
    ) -> SadResult<Self> {
        let label = label.map(Label::parse).transpose()?;
        Ok(Self {
            label,
            start,
            end,
            score,
        })
    }

    /// Segment with a label and both times set, no score.
    pub fn with_label(label: Label, start: f64, end: f64) -> Self {
        Self {
            label: Some(label),
            start: Some(start),
            end: Some(end),
            score: None,
        }
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn start(&self) -> Option<f64> {
        self.start
    }

    pub fn end(&self) -> Option<f64> {
        self.end
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// `end - start` when both times are set.
    pub fn duration(&self) -> Option<f64> {
        Some(self.end? - self.start?)
    }

    pub fn set_start(&mut self, start: Option<f64>) {
        self.start = start;
    }

    pub fn set_end(&mut self, end: Option<f64>) {
        self.end = end;
    }

    pub fn set_score(&mut self, score: Option<f64>) {
        self.score = score;
    }

    /// Replace the label. `None` removes it. Returns the number of names now
    /// attached to the segment.
    pub fn set_label(&mut self, names: Option<&str>) -> SadResult<usize> {
        match names {
            Some(text) => {
                let label = Label::parse(text)?;
                let count = label.len();
                self.label = Some(label);
                Ok(count)
            }
            None => {
                self.label = None;
                Ok(0)
            }
        }
    }

    /// Append names to the label, creating it if the segment had none.
    /// Returns the number of names now attached to the segment.
    pub fn add_label(&mut self, names: &str) -> SadResult<usize> {
        let added = Label::parse(names)?;
        match self.label.as_mut() {
            Some(label) => {
                label.extend(added);
                Ok(label.len())
            }
            None => {
                let count = added.len();
                self.label = Some(added);
                Ok(count)
            }
        }
    }

    /// True if the label contains `name`.
    pub fn has_name(&self, name: &str) -> bool {
        self.label.as_ref().is_some_and(|l| l.contains(name))
    }
}

/// Ordered list of segments, owned as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    segments: Vec<Segment>,
}

impl Segmentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment at the tail and return it.
    pub fn push(&mut self, segment: Segment) -> &mut Segment {
        self.segments.push(segment);
        let tail = self.segments.len() - 1;
        &mut self.segments[tail]
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Segment> {
        self.segments.last_mut()
    }

    /// Segment following the one at `index`.
    pub fn next(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index.checked_add(1)?)
    }

    /// Segment preceding the one at `index`.
    pub fn prev(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index.checked_sub(1)?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    /// Check the ordering invariants: start times non-decreasing, no segment
    /// overlapping its successor, and `end >= start` where both are set.
    pub fn is_well_formed(&self) -> bool {
        let ordered = self.segments.windows(2).all(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            let starts = match (a.start, b.start) {
                (Some(sa), Some(sb)) => sa <= sb,
                _ => true,
            };
            let gap = match (a.end, b.start) {
                (Some(ea), Some(sb)) => ea <= sb,
                _ => true,
            };
            starts && gap
        });
        ordered && self.segments.iter().all(|s| s.duration().map_or(true, |d| d >= 0.0))
    }

    /// Number of segments and summed duration of the segments carrying `name`.
    pub fn totals_for(&self, name: &str) -> (usize, f64) {
        self.segments
            .iter()
            .filter(|s| s.has_name(name))
            .fold((0, 0.0), |(n, d), s| (n + 1, d + s.duration().unwrap_or(0.0)))
    }
}

impl IntoIterator for Segmentation {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Segmentation {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl FromIterator<Segment> for Segmentation {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Builds a segmentation by appending at the tail.
///
/// The builder owns the list until [`SegmentBuilder::finish`] hands it to the
/// caller, so two builds never share state.
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    segmentation: Segmentation,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a labeled `[start, end]` segment and return the new tail.
    pub fn add_segment(&mut self, start: f64, end: f64, label: Label) -> &mut Segment {
        self.segmentation
            .push(Segment::with_label(label, start, end))
    }

    pub fn tail_mut(&mut self) -> Option<&mut Segment> {
        self.segmentation.last_mut()
    }

    pub fn len(&self) -> usize {
        self.segmentation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segmentation.is_empty()
    }

    pub fn finish(self) -> Segmentation {
        self.segmentation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(label: &str, start: f64, end: f64) -> Segment {
        Segment::new(Some(label), Some(start), Some(end), None).unwrap()
    }

    #[test]
    fn test_new_without_label() {
        let s = Segment::new(None, Some(1.0), None, None).unwrap();
        assert!(s.label().is_none());
        assert_eq!(s.start(), Some(1.0));
        assert_eq!(s.end(), None);
        assert_eq!(s.duration(), None);
    }

    #[test]
    fn test_new_rejects_empty_label() {
        assert!(Segment::new(Some("+"), None, None, None).is_err());
    }

    #[test]
    fn test_set_and_add_label_counts() {
        let mut s = seg("speech", 0.0, 1.0);
        assert_eq!(s.add_label("loud+speech").unwrap(), 2);
        assert!(s.has_name("loud"));
        assert_eq!(s.set_label(Some("sil")).unwrap(), 1);
        assert!(!s.has_name("loud"));
        assert_eq!(s.set_label(None).unwrap(), 0);
        assert!(s.label().is_none());
        assert_eq!(s.add_label("music").unwrap(), 1);
    }

    #[test]
    fn test_failed_set_label_reports_error() {
        let mut s = seg("speech", 0.0, 1.0);
        assert!(s.set_label(Some("")).is_err());
        assert!(s.add_label("++").is_err());
    }

    #[test]
    fn test_neighbour_navigation() {
        let list: Segmentation = vec![seg("a", 0.0, 1.0), seg("b", 1.0, 2.0)]
            .into_iter()
            .collect();
        assert_eq!(list.next(0), list.get(1));
        assert_eq!(list.prev(1), list.get(0));
        assert!(list.prev(0).is_none());
        assert!(list.next(1).is_none());
    }

    #[test]
    fn test_well_formed_detection() {
        let good: Segmentation = vec![seg("a", 0.0, 1.0), seg("b", 1.0, 2.0)]
            .into_iter()
            .collect();
        assert!(good.is_well_formed());

        let overlapping: Segmentation = vec![seg("a", 0.0, 1.5), seg("b", 1.0, 2.0)]
            .into_iter()
            .collect();
        assert!(!overlapping.is_well_formed());

        let reversed: Segmentation = vec![seg("a", 2.0, 1.0)].into_iter().collect();
        assert!(!reversed.is_well_formed());
    }

    #[test]
    fn test_builder_appends_at_tail() {
        let mut builder = SegmentBuilder::new();
        builder.add_segment(0.0, 0.4, Label::parse("sil").unwrap());
        let tail = builder.add_segment(0.4, 1.0, Label::parse("speech").unwrap());
        assert_eq!(tail.start(), Some(0.4));
        tail.set_end(Some(1.2));

        let list = builder.finish();
        assert_eq!(list.len(), 2);
        assert_eq!(list.last().and_then(|s| s.end()), Some(1.2));
        assert_eq!(list.totals_for("sil"), (1, 0.4));
    }
}
