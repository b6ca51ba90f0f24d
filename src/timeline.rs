use serde::{Deserialize, Serialize};

const CONTIGUOUS_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// True when `next` begins exactly where this interval ends.
    pub fn touches(&self, next: &Interval) -> bool {
        (self.end - next.start).abs() <= CONTIGUOUS_EPS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub interval: Interval,
    pub text: String,
}

/// Candidate search keywords for one slice of the narration, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedQuery {
    pub interval: Interval,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootageSegment {
    pub interval: Interval,
    pub url: Option<String>,
}

impl FootageSegment {
    pub fn is_resolved(&self) -> bool {
        self.url.is_some()
    }
}

pub fn end_of(captions: &[Caption]) -> Option<f64> {
    captions.last().map(|c| c.interval.end)
}

/// Covers unresolved intervals with neighbouring footage.
///
/// A run of unresolved intervals is absorbed into the resolved segment before
/// it (extending it when contiguous, reusing its URL otherwise). Unresolved
/// intervals before the first match borrow the first match. If nothing
/// resolved at all the input is returned unchanged.
pub fn fill_gaps(segments: Vec<FootageSegment>) -> Vec<FootageSegment> {
    if !segments.iter().any(FootageSegment::is_resolved) {
        return segments;
    }

    let mut merged: Vec<FootageSegment> = Vec::with_capacity(segments.len());
    let mut leading: Option<Interval> = None;

    for segment in segments {
        match segment.url {
            Some(url) => {
                let mut interval = segment.interval;
                if let Some(lead) = leading.take() {
                    if lead.touches(&interval) {
                        interval.start = lead.start;
                    } else {
                        merged.push(FootageSegment {
                            interval: lead,
                            url: Some(url.clone()),
                        });
                    }
                }
                merged.push(FootageSegment {
                    interval,
                    url: Some(url),
                });
            }
            None => match merged.last_mut() {
                Some(prev) if prev.interval.touches(&segment.interval) => {
                    prev.interval.end = segment.interval.end;
                }
                Some(prev) => {
                    let url = prev.url.clone();
                    merged.push(FootageSegment {
                        interval: segment.interval,
                        url,
                    });
                }
                None => {
                    leading = Some(match leading {
                        Some(lead) if lead.touches(&segment.interval) => {
                            Interval::new(lead.start, segment.interval.end)
                        }
                        Some(lead) => Interval::new(lead.start, segment.interval.end.max(lead.end)),
                        None => segment.interval,
                    });
                }
            },
        }
    }

    merged
}
