//! Template post-processing: declared special tokens wrapped around the
//! model's output id stream.

/// The id stream handed back by `encode`, with its attention mask.
///
/// The mask is 1 for every emitted id; no padding is applied here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl Encoding {
    pub fn from_ids(input_ids: Vec<u32>) -> Self {
        let attention_mask = vec![1; input_ids.len()];
        Self {
            input_ids,
            attention_mask,
        }
    }
}

/// One step of a processing template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStep {
    /// Emit this special token id inline. Ids that failed to resolve at load
    /// time are carried as `None` and skipped silently.
    SpecialToken(Option<u32>),
    /// Splice in the model's output ids.
    Sequence,
}

/// The `TemplateProcessing` post-processor.
#[derive(Debug, Clone, Default)]
pub struct TemplateProcessing {
    steps: Vec<TemplateStep>,
}

impl TemplateProcessing {
    pub fn new(steps: Vec<TemplateStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Rewrite the encoding according to the template and rebuild the mask.
    pub fn process(&self, encoding: &mut Encoding) {
        let mut out = Vec::with_capacity(encoding.input_ids.len() + self.steps.len());
        for step in &self.steps {
            match step {
                TemplateStep::SpecialToken(Some(id)) => out.push(*id),
                TemplateStep::SpecialToken(None) => {}
                TemplateStep::Sequence => out.extend_from_slice(&encoding.input_ids),
            }
        }
        encoding.attention_mask = vec![1; out.len()];
        encoding.input_ids = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_sequence_with_special_tokens() {
        let tp = TemplateProcessing::new(vec![
            TemplateStep::SpecialToken(Some(1)),
            TemplateStep::Sequence,
            TemplateStep::SpecialToken(Some(2)),
        ]);
        let mut enc = Encoding::from_ids(vec![10, 11]);
        tp.process(&mut enc);
        assert_eq!(enc.input_ids, vec![1, 10, 11, 2]);
        assert_eq!(enc.attention_mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn unresolved_special_tokens_are_skipped() {
        let tp = TemplateProcessing::new(vec![
            TemplateStep::SpecialToken(None),
            TemplateStep::Sequence,
        ]);
        let mut enc = Encoding::from_ids(vec![5]);
        tp.process(&mut enc);
        assert_eq!(enc.input_ids, vec![5]);
        assert_eq!(enc.attention_mask, vec![1]);
    }
}
