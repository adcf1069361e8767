use enum_map::{Enum, EnumMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum LabelKind {
    If,
    While,
    IndexCarry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfLabels {
    pub start: String,
    pub elifs: Vec<String>,
    pub otherwise: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileLabels {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryLabels {
    pub carry: String,
    pub done: String,
}

/// Hands out label names. Every construct instance gets the next number
/// for its kind, and numbers are never handed out twice.
#[derive(Debug, Default)]
pub struct LabelManager {
    counters: EnumMap<LabelKind, usize>,
}

impl LabelManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self, kind: LabelKind) -> usize {
        self.counters[kind] += 1;
        self.counters[kind]
    }

    pub fn if_labels(&mut self, elifs: usize) -> IfLabels {
        let n = self.next(LabelKind::If);
        IfLabels {
            start: format!("if_{}", n),
            elifs: (1..=elifs).map(|k| format!("elif_{}_{}", n, k)).collect(),
            otherwise: format!("else_{}", n),
            end: format!("endif_{}", n),
        }
    }

    pub fn while_labels(&mut self) -> WhileLabels {
        let n = self.next(LabelKind::While);
        WhileLabels {
            start: format!("while_{}", n),
            end: format!("endwhile_{}", n),
        }
    }

    pub fn carry_labels(&mut self) -> CarryLabels {
        let n = self.next(LabelKind::IndexCarry);
        CarryLabels {
            carry: format!("idx_carry_{}", n),
            done: format!("idx_done_{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_kind() {
        let mut lm = LabelManager::new();
        let w = lm.while_labels();
        let i = lm.if_labels(2);
        let w2 = lm.while_labels();

        assert_eq!(w.start, "while_1");
        assert_eq!(w2.end, "endwhile_2");
        assert_eq!(i.start, "if_1");
        assert_eq!(i.elifs, vec!["elif_1_1", "elif_1_2"]);
        assert_eq!(i.otherwise, "else_1");
        assert_eq!(i.end, "endif_1");
    }

    #[test]
    fn never_reused() {
        let mut lm = LabelManager::new();
        let a = lm.carry_labels();
        let b = lm.carry_labels();
        assert_ne!(a.carry, b.carry);
        assert_ne!(a.done, b.done);
    }
}
