//! Compilation of pattern trees into a backtracking program.

use crate::error::{MorphError, Result};
use crate::pattern::node::{Constraint, PatternNode};
use crate::shape::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inst {
    /// Consume one node satisfying constraint `n`.
    Test(usize),
    /// Record the current position in capture slot `n`.
    Save(usize),
    /// Try `.0` first, then `.1`.
    Split(usize, usize),
    Jump(usize),
    Match,
}

#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub(crate) insts: Vec<Inst>,
    pub(crate) constraints: Vec<Constraint>,
    /// Group name for each pair of slots `(2k, 2k + 1)`.
    pub(crate) groups: Vec<String>,
}

impl Program {
    /// Compile `nodes` for a scan in `dir`; right-to-left scans see the pattern reversed.
    pub(crate) fn compile(nodes: &[PatternNode], dir: Direction) -> Result<Program> {
        let mut program = Program {
            insts: Vec::new(),
            constraints: Vec::new(),
            groups: Vec::new(),
        };
        program.emit_seq(nodes, dir)?;
        program.insts.push(Inst::Match);
        Ok(program)
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.groups.len() * 2
    }

    fn emit_seq(&mut self, nodes: &[PatternNode], dir: Direction) -> Result<()> {
        match dir {
            Direction::LeftToRight => {
                for node in nodes {
                    self.emit(node, dir)?;
                }
            }
            Direction::RightToLeft => {
                for node in nodes.iter().rev() {
                    self.emit(node, dir)?;
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, node: &PatternNode, dir: Direction) -> Result<()> {
        match node {
            PatternNode::Constraint(c) => {
                self.constraints.push(c.clone());
                self.insts.push(Inst::Test(self.constraints.len() - 1));
            }
            PatternNode::Group { name, children } => {
                let slot = self.groups.len() * 2;
                self.groups.push(name.clone());
                self.insts.push(Inst::Save(slot));
                self.emit_seq(children, dir)?;
                self.insts.push(Inst::Save(slot + 1));
            }
            PatternNode::Quantifier { min, max, child } => {
                if child.is_nullable() {
                    return Err(MorphError::InvalidPattern(
                        "quantified sub-pattern can match the empty sequence".to_string(),
                    ));
                }
                if let Some(max) = max {
                    if *max < *min || *max == 0 {
                        return Err(MorphError::InvalidPattern(format!(
                            "invalid repetition bounds {{{},{}}}",
                            min, max
                        )));
                    }
                }
                for _ in 0..*min {
                    self.emit(child, dir)?;
                }
                match max {
                    None => {
                        let split = self.insts.len();
                        self.insts.push(Inst::Split(0, 0));
                        self.emit(child, dir)?;
                        self.insts.push(Inst::Jump(split));
                        let exit = self.insts.len();
                        self.insts[split] = Inst::Split(split + 1, exit);
                    }
                    Some(max) => {
                        let mut splits = Vec::new();
                        for _ in *min..*max {
                            splits.push(self.insts.len());
                            self.insts.push(Inst::Split(0, 0));
                            self.emit(child, dir)?;
                        }
                        let exit = self.insts.len();
                        for split in splits {
                            self.insts[split] = Inst::Split(split + 1, exit);
                        }
                    }
                }
            }
            PatternNode::Alternation(alts) => {
                let mut jumps = Vec::new();
                for (i, alt) in alts.iter().enumerate() {
                    if i + 1 < alts.len() {
                        let split = self.insts.len();
                        self.insts.push(Inst::Split(0, 0));
                        self.emit_seq(alt, dir)?;
                        jumps.push(self.insts.len());
                        self.insts.push(Inst::Jump(0));
                        let next = self.insts.len();
                        self.insts[split] = Inst::Split(split + 1, next);
                    } else {
                        self.emit_seq(alt, dir)?;
                    }
                }
                let end = self.insts.len();
                for jump in jumps {
                    self.insts[jump] = Inst::Jump(end);
                }
            }
        }
        Ok(())
    }
}
