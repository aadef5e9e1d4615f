//! Categorical label encoding with serving-time vocabulary growth.
//!
//! ## Responsibility
//!
//! - Map categorical labels to the dense integer codes the model was
//!   trained on
//! - Absorb never-seen labels by appending them: the new code equals the
//!   vocabulary size before the append
//! - Serialize mutation per column so racing requests agree on codes
//!
//! ## Guarantees
//!
//! - Codes are dense from 0 and stable for the process lifetime
//! - Two concurrent requests carrying the same novel label get the same code
//! - Two distinct novel labels never share a code
//! - Lookups of known labels take a read lock and run concurrently
//!
//! ## NOT Responsible For
//!
//! - Persisting growth (the vocabulary resets on restart)
//! - Choosing which columns exist (fixed at construction, see
//!   [`crate::CATEGORICAL_COLUMNS`])

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{PredictionError, CATEGORICAL_COLUMNS};

/// One column's label↔code mapping, labels in first-seen order.
///
/// Pure data structure with no interior locking; [`EncoderRegistry`] owns
/// the synchronization. Kept separate so the encoding rules are testable
/// without an async runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalEncoder {
    column: String,
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl CategoricalEncoder {
    /// Build an encoder from a training-time vocabulary. Codes are assigned
    /// by position: `labels[0]` encodes to 0, `labels[1]` to 1, and so on.
    pub fn new(column: impl Into<String>, labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code))
            .collect();
        Self {
            column: column.into(),
            labels,
            index,
        }
    }

    /// Column this encoder belongs to.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Code for a known label, `None` when unseen. O(1).
    pub fn code_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Look up or append: a known label keeps its existing code, a novel
    /// one is appended and assigned the vocabulary size before the append.
    pub fn encode(&mut self, label: &str) -> usize {
        if let Some(code) = self.code_of(label) {
            return code;
        }
        let code = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), code);
        code
    }

    /// Vocabulary size.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no labels are known yet.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in code order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Fixed-schema registry: one encoder per categorical column, shared by
/// every request task.
///
/// The column set is immutable after construction. Each column carries its
/// own lock, so growth on one column never blocks lookups on another.
#[derive(Debug)]
pub struct EncoderRegistry {
    columns: Vec<ColumnSlot>,
}

#[derive(Debug)]
struct ColumnSlot {
    name: &'static str,
    encoder: RwLock<CategoricalEncoder>,
}

impl EncoderRegistry {
    /// Assemble the registry from per-column encoders. Input order does not
    /// matter; slots are arranged in schema order.
    ///
    /// # Errors
    ///
    /// [`PredictionError::Configuration`] when a schema column is missing,
    /// appears twice, or an unknown column is supplied.
    pub fn new(encoders: Vec<CategoricalEncoder>) -> Result<Self, PredictionError> {
        let mut by_name: HashMap<String, CategoricalEncoder> = HashMap::new();
        for encoder in encoders {
            if !CATEGORICAL_COLUMNS.contains(&encoder.column()) {
                return Err(PredictionError::Configuration(format!(
                    "unrecognized feature column '{}'",
                    encoder.column()
                )));
            }
            let column = encoder.column().to_string();
            if by_name.insert(column.clone(), encoder).is_some() {
                return Err(PredictionError::Configuration(format!(
                    "column '{column}' supplied twice"
                )));
            }
        }

        let mut columns = Vec::with_capacity(CATEGORICAL_COLUMNS.len());
        for name in CATEGORICAL_COLUMNS {
            let encoder = by_name.remove(name).ok_or_else(|| {
                PredictionError::Configuration(format!("no encoder supplied for column '{name}'"))
            })?;
            columns.push(ColumnSlot {
                name,
                encoder: RwLock::new(encoder),
            });
        }
        Ok(Self { columns })
    }

    /// Encode one label, growing the column's vocabulary when it is novel.
    ///
    /// Fast path takes a read lock. The append path re-checks under the
    /// write lock: a racing request may have absorbed the same label while
    /// we waited, and it must keep the code it was assigned.
    ///
    /// # Errors
    ///
    /// [`PredictionError::Configuration`] when `column` is not part of the
    /// fixed schema. Callers iterating [`crate::CATEGORICAL_COLUMNS`] never
    /// hit this.
    pub async fn encode(&self, column: &str, label: &str) -> Result<usize, PredictionError> {
        let slot = self.slot(column)?;

        {
            let encoder = slot.encoder.read().await;
            if let Some(code) = encoder.code_of(label) {
                return Ok(code);
            }
        }

        let mut encoder = slot.encoder.write().await;
        if let Some(code) = encoder.code_of(label) {
            return Ok(code);
        }
        let code = encoder.encode(label);
        crate::metrics::inc_unseen_label(slot.name);
        crate::metrics::set_vocabulary_size(slot.name, encoder.len() as i64);
        tracing::info!(
            target: "emissions::encoder",
            column = slot.name,
            label = %label,
            code,
            vocabulary = encoder.len(),
            "novel label absorbed"
        );
        Ok(code)
    }

    /// Current vocabulary size of one column.
    ///
    /// # Errors
    ///
    /// [`PredictionError::Configuration`] when `column` is not part of the
    /// fixed schema.
    pub async fn vocabulary_size(&self, column: &str) -> Result<usize, PredictionError> {
        Ok(self.slot(column)?.encoder.read().await.len())
    }

    fn slot(&self, column: &str) -> Result<&ColumnSlot, PredictionError> {
        self.columns
            .iter()
            .find(|slot| slot.name == column)
            .ok_or_else(|| {
                PredictionError::Configuration(format!("unrecognized feature column '{column}'"))
            })
    }
}
