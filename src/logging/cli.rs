//! Command-line logger
use super::{Event, LogError, Loggable, Logger};
use coarsetime::{Duration, Instant};
use enum_map::{enum_map, EnumMap};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Drop;
use yansi::Paint;

/// Logger that writes periodic summaries to standard output.
#[derive(Debug)]
pub struct CLILogger {
    events: EnumMap<Event, EventLog>,

    display_period: Duration,
    last_display_time: Instant,

    average_between_displays: bool,
}

impl CLILogger {
    pub fn new(display_period: std::time::Duration, average_between_displays: bool) -> Self {
        Self {
            events: enum_map! { _ => EventLog::new() },
            display_period: Duration::new(
                display_period.as_secs(),
                display_period.subsec_nanos(),
            ),
            last_display_time: Instant::now(),
            average_between_displays,
        }
    }

    /// Display the summary and clear all stored data.
    pub fn display(&mut self) {
        let elapsed = self.last_display_time.elapsed();
        for (event, event_log) in self.events.iter_mut() {
            let summary_size = event_log.index - event_log.summary_start_index;
            if summary_size == 0 {
                continue;
            }

            let heading = if self.average_between_displays {
                format!(
                    "{:?}s {} - {}",
                    event,
                    event_log.summary_start_index,
                    event_log.index - 1
                )
            } else {
                format!("{:?} {}", event, event_log.index - 1)
            };
            println!(
                "==== {} ({:.3?} / event) ====",
                Paint::fixed(35, heading),
                std::time::Duration::from_nanos(elapsed.as_nanos())
                    / u32::try_from(summary_size).unwrap_or(u32::MAX)
            );

            for (name, aggregator) in &mut event_log.aggregators {
                println!("{:<24} {}", Paint::fixed(111, name), aggregator);
                aggregator.clear()
            }
            event_log.summary_start_index = event_log.index;
        }
        self.last_display_time = Instant::now();
    }
}

impl Default for CLILogger {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(1), true)
    }
}

impl Logger for CLILogger {
    fn log(&mut self, event: Event, name: &str, value: Loggable) -> Result<(), LogError> {
        // The entry API does not support lookup with Borrow + ToOwned
        // so make separate get() / insert() calls.
        // The duplicated lookup happens once per name since aggregators are never removed.
        let aggregators = &mut self.events[event].aggregators;
        if let Some(aggregator) = aggregators.get_mut(name) {
            if let Err((value, expected)) = aggregator.update(value) {
                return Err(LogError::new(name, value, expected));
            }
        } else {
            aggregators.insert(name.into(), Aggregator::new(value));
        }
        Ok(())
    }

    fn done(&mut self, event: Event) {
        let event_log = &mut self.events[event];
        event_log.index += 1;

        for aggregator in event_log.aggregators.values_mut() {
            aggregator.commit()
        }

        if self.last_display_time.elapsed() >= self.display_period {
            self.display();
        }
    }
}

impl Drop for CLILogger {
    fn drop(&mut self) {
        // Ensure everything is flushed.
        self.display();
    }
}

#[derive(Debug)]
struct EventLog {
    /// Global index for this event
    index: u64,
    /// Value of `index` at the start of this summary period
    summary_start_index: u64,
    /// An aggregator for each log entry.
    aggregators: BTreeMap<String, Aggregator>,
}

impl EventLog {
    const fn new() -> Self {
        Self {
            index: 0,
            summary_start_index: 0,
            aggregators: BTreeMap::new(),
        }
    }
}

/// Aggregates the values logged under one name.
///
/// Values logged during an event are pending until the event is done.
/// Only the last value logged in an event is kept.
#[derive(Debug)]
enum Aggregator {
    Nothing,
    ScalarMean {
        sum: f64,
        count: u64,
        pending: Option<f64>,
    },
    IndexDistribution {
        counts: Vec<u64>,
        pending: Option<usize>,
    },
    MessageCounts {
        counts: BTreeMap<Cow<'static, str>, u64>,
        pending: Option<Cow<'static, str>>,
    },
}

impl Aggregator {
    /// Create a new aggregator from the first logged value.
    fn new(value: Loggable) -> Self {
        match value {
            Loggable::Nothing => Self::Nothing,
            Loggable::Scalar(x) => Self::ScalarMean {
                sum: 0.0,
                count: 0,
                pending: Some(x),
            },
            Loggable::IndexSample { value, size } => Self::IndexDistribution {
                counts: vec![0; size],
                pending: Some(value),
            },
            Loggable::Message(message) => Self::MessageCounts {
                counts: BTreeMap::new(),
                pending: Some(message),
            },
        }
    }

    /// Update an aggregator with a logged value within an event.
    ///
    /// Returns Err((value, expected)) if the value is incompatible with this aggregator.
    fn update(&mut self, value: Loggable) -> Result<(), (Loggable, String)> {
        match (self, value) {
            (Self::Nothing, Loggable::Nothing) => {}
            (Self::ScalarMean { pending, .. }, Loggable::Scalar(x)) => *pending = Some(x),
            (Self::IndexDistribution { counts, pending }, Loggable::IndexSample { value, size })
                if counts.len() == size && value < size =>
            {
                *pending = Some(value)
            }
            (Self::MessageCounts { pending, .. }, Loggable::Message(message)) => {
                *pending = Some(message)
            }
            (aggregator, value) => return Err((value, aggregator.expected())),
        }
        Ok(())
    }

    fn expected(&self) -> String {
        match self {
            Self::Nothing => "Nothing".into(),
            Self::ScalarMean { .. } => "Scalar".into(),
            Self::IndexDistribution { counts, .. } => {
                format!("IndexSample{{size: {}}}", counts.len())
            }
            Self::MessageCounts { .. } => "Message".into(),
        }
    }

    /// Commit the pending value into the aggregate.
    fn commit(&mut self) {
        match self {
            Self::Nothing => {}
            Self::ScalarMean {
                sum,
                count,
                pending,
            } => {
                if let Some(x) = pending.take() {
                    *sum += x;
                    *count += 1;
                }
            }
            Self::IndexDistribution { counts, pending } => {
                if let Some(i) = pending.take() {
                    counts[i] += 1;
                }
            }
            Self::MessageCounts { counts, pending } => {
                if let Some(message) = pending.take() {
                    *counts.entry(message).or_insert(0) += 1;
                }
            }
        }
    }

    /// Clear the aggregated values (but not the pending values)
    fn clear(&mut self) {
        match self {
            Self::Nothing => {}
            Self::ScalarMean { sum, count, .. } => {
                *sum = 0.0;
                *count = 0;
            }
            Self::IndexDistribution { counts, .. } => counts.iter_mut().for_each(|c| *c = 0),
            Self::MessageCounts { counts, .. } => counts.clear(),
        }
    }
}

/// Display the commited aggregated value.
impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "Nothing"),
            Self::ScalarMean { sum, count, .. } => {
                if *count > 0 {
                    write!(f, "{:.4}", sum / *count as f64)
                } else {
                    write!(f, "None")
                }
            }
            Self::IndexDistribution { counts, .. } => {
                let total: u64 = counts.iter().sum();
                if total == 0 {
                    return write!(f, "None");
                }
                write!(f, "[")?;
                for (i, c) in counts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:.3}", *c as f64 / total as f64)?;
                }
                write!(f, "]")
            }
            Self::MessageCounts { counts, .. } => {
                for (message, count) in counts {
                    write!(f, "[x{}] {} ", count, message)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_mean_over_events() {
        let mut aggregator = Aggregator::new(Loggable::Scalar(1.0));
        aggregator.commit();
        aggregator.update(Loggable::Scalar(3.0)).unwrap();
        aggregator.commit();
        assert_eq!(aggregator.to_string(), "2.0000");
        aggregator.clear();
        assert_eq!(aggregator.to_string(), "None");
    }

    #[test]
    fn pending_keeps_last_value() {
        let mut aggregator = Aggregator::new(Loggable::Scalar(1.0));
        aggregator.update(Loggable::Scalar(5.0)).unwrap();
        aggregator.commit();
        assert_eq!(aggregator.to_string(), "5.0000");
    }

    #[test]
    fn incompatible_value() {
        let mut logger = CLILogger::new(std::time::Duration::from_secs(3600), true);
        logger.log(Event::Episode, "reward", 1.0.into()).unwrap();
        let result = logger.log(
            Event::Episode,
            "reward",
            Loggable::IndexSample { value: 0, size: 2 },
        );
        assert!(result.is_err());
    }

    #[test]
    fn index_distribution() {
        let mut aggregator = Aggregator::new(Loggable::IndexSample { value: 0, size: 2 });
        aggregator.commit();
        for _ in 0..3 {
            aggregator
                .update(Loggable::IndexSample { value: 1, size: 2 })
                .unwrap();
            aggregator.commit();
        }
        assert_eq!(aggregator.to_string(), "[0.250, 0.750]");
        assert!(aggregator
            .update(Loggable::IndexSample { value: 0, size: 3 })
            .is_err());
    }
}
