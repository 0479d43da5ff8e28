//! Control-flow blocks and the definite single-assignment analysis.
//!
//! The front end lowers each constructor body and initializer block into a
//! flat instruction list with explicit jump offsets. This module answers one
//! question about such a block: which of a given set of variables is written
//! **exactly once on every execution path** through it. Field finality
//! depends on that answer.
//!
//! Performance characteristics:
//! - Per variable: worklist over (write_count, instruction) states with the
//!   write count saturated at 2, so the state space is bounded by 3 * |block|
//! - Whole query: O(|vars| * |block|) in practice

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::DeclId;

/// A lowered control-flow block.
///
/// Offsets in jump instructions index into `instructions`; an offset at or
/// past the end of the list means "fall off the end of the block".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlFlow {
    pub instructions: Vec<Instruction>,
}

/// One lowered instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Instruction {
    /// Read of a variable (field or parameter).
    Read(DeclId),
    /// Write of a variable.
    Write(DeclId),
    /// Unconditional jump.
    Goto(usize),
    /// Two-way branch: jump to the offset or fall through.
    CondGoto(usize),
    /// Return from the block.
    Ret,
    /// Redirecting call to another in-class constructor.
    Delegate(DeclId),
}

impl ControlFlow {
    /// Create a block from an instruction list.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// All variables written anywhere in the block (on any path).
    pub fn written_vars(&self) -> HashSet<DeclId> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Write(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// The redirect target if the block starts with a delegating
    /// constructor call, none otherwise.
    pub fn delegate_target(&self) -> Option<DeclId> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Delegate(target) => Some(*target),
            _ => None,
        })
    }
}

/// Exploration state: how many writes of the variable under test have been
/// seen on the path so far, and where the path currently is.
///
/// Write counts compare saturated at 2 — once a path has seen two writes the
/// variable is disqualified no matter how many more follow, so deeper counts
/// collapse into one state and the worklist stays finite on cyclic flows.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct SsaState {
    write_count: u8,
    idx: usize,
}

impl SsaState {
    fn new(write_count: u8, idx: usize) -> Self {
        Self {
            write_count: write_count.min(2),
            idx,
        }
    }
}

/// Computes the subset of `candidates` assigned exactly once along every
/// path through `flow`.
///
/// A variable is dropped from the result when any path:
/// - writes it more than once,
/// - reads it before the first write, or
/// - reaches the end of the block without writing it at all.
///
/// Variables never written in the block are not reported (a block that does
/// not touch a variable says nothing about it).
pub fn single_assigned_vars(flow: &ControlFlow, candidates: &HashSet<DeclId>) -> HashSet<DeclId> {
    let instructions = &flow.instructions;
    let end = instructions.len();
    let mut result = HashSet::new();

    'vars: for &var in flow.written_vars().intersection(candidates) {
        let mut queue = vec![SsaState::new(0, 0)];
        let mut processed: HashSet<SsaState> = HashSet::new();

        while let Some(state) = queue.pop() {
            if state.write_count > 1 {
                continue 'vars;
            }
            if !processed.insert(state) {
                continue;
            }
            if state.idx >= end {
                // A path that falls off the end without initializing the
                // variable disqualifies it.
                if state.write_count == 0 {
                    continue 'vars;
                }
                continue;
            }

            match &instructions[state.idx] {
                Instruction::Goto(offset) => {
                    queue.push(SsaState::new(state.write_count, (*offset).min(end)));
                }
                Instruction::CondGoto(offset) => {
                    queue.push(SsaState::new(state.write_count, (*offset).min(end)));
                    queue.push(SsaState::new(state.write_count, state.idx + 1));
                }
                Instruction::Ret => {
                    queue.push(SsaState::new(state.write_count, end));
                }
                Instruction::Write(written) => {
                    let bump = u8::from(*written == var);
                    queue.push(SsaState::new(state.write_count + bump, state.idx + 1));
                }
                Instruction::Read(read) => {
                    if *read == var && state.write_count == 0 {
                        continue 'vars;
                    }
                    queue.push(SsaState::new(state.write_count, state.idx + 1));
                }
                Instruction::Delegate(_) => {
                    queue.push(SsaState::new(state.write_count, state.idx + 1));
                }
            }
        }

        result.insert(var);
    }

    result
}
