//! Identifier assignment for interactive elements.

/// Counter state for one document parse.
///
/// Owned by the caller and threaded through the walk. Reset it before each
/// independent document; never in the middle of one, since `html` blocks
/// inside a guide continue the same numbering.
#[derive(Debug, Default, Clone)]
pub struct ParseContext {
    next_id: u32,
}

/// Which family of interactive element an id is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveKind {
    Section,
    Step,
    MultiStep,
    Guided,
    Quiz,
}

impl InteractiveKind {
    fn prefix(self) -> &'static str {
        match self {
            InteractiveKind::Section => "section",
            InteractiveKind::Step => "step",
            InteractiveKind::MultiStep => "multistep",
            InteractiveKind::Guided => "guided",
            InteractiveKind::Quiz => "quiz",
        }
    }
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.next_id = 0;
    }

    /// Hand out the next id, e.g. `step-3`.
    pub fn next_id(&mut self, kind: InteractiveKind) -> String {
        self.next_id += 1;
        format!("{}-{}", kind.prefix(), self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    #[test]
    fn ids_share_one_counter_and_reset() {
        let mut ctx = ParseContext::new();
        assert_eq!(ctx.next_id(InteractiveKind::Section), "section-1");
        assert_eq!(ctx.next_id(InteractiveKind::Step), "step-2");
        ctx.reset();
        assert_eq!(ctx.next_id(InteractiveKind::Quiz), "quiz-1");
    }
}
