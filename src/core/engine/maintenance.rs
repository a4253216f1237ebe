//! Whole-memory maintenance: defragmentation, randomization, majority-vote
//! correction and snapshots.

use super::Engine;
use crate::error::Result;
use crate::permissions::{Permission, PermissionTable};
use crate::snapshot::EngineState;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of [`Engine::defragment`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DefragReport {
    /// Cells whose address changed
    pub moved_bits: usize,
    /// Variables whose position was rewritten
    pub relocated_variables: usize,
    /// Entries left in place because their range was not fully in use
    pub stale_variables: Vec<String>,
}

impl Engine {
    /// Compact all used cells toward address 0.
    ///
    /// Content, usage and permissions move together and the copies are
    /// rewritten from the primary. Variables whose whole range is in use
    /// follow their bits and keep their alignment. Gaps and the freed tail
    /// read as zero with open permissions.
    pub fn defragment(&mut self) -> DefragReport {
        let live: HashSet<String> = self
            .variables
            .by_position()
            .into_iter()
            .filter(|(_, variable)| {
                variable.length > 0
                    && variable.end() <= self.size()
                    && (variable.position..variable.end()).all(|p| self.allocator.is_used(p))
            })
            .map(|(name, _)| name.to_string())
            .collect();

        let aligned_starts: Vec<(usize, usize)> = self
            .variables
            .by_position()
            .into_iter()
            .filter(|(name, _)| live.contains(*name))
            .map(|(_, variable)| (variable.position, variable.alignment))
            .collect();

        let relocation = self.allocator.plan_compaction(&aligned_starts);

        let previous = self.permissions.cells();
        let mut cells = vec![Permission::OPEN; previous.len()];
        for &(from, to) in relocation.moves() {
            cells[to] = previous[from];
        }
        self.permissions = PermissionTable::from_cells(cells);
        self.memory.apply_relocation(&relocation);
        self.allocator.apply_compaction(&relocation);

        let mut report = DefragReport {
            moved_bits: relocation.displaced(),
            ..DefragReport::default()
        };

        for (name, variable) in self.variables.entries_mut() {
            if variable.length == 0 {
                continue;
            }
            let target = if live.contains(name) {
                relocation.moves_contiguously(variable.position, variable.length)
            } else {
                None
            };
            match target {
                Some(position) => {
                    if position != variable.position {
                        debug!(
                            "Relocated '{}' from {} to {}",
                            name, variable.position, position
                        );
                        variable.position = position;
                        report.relocated_variables += 1;
                    }
                }
                None => {
                    warn!(
                        "Variable '{}' at {} is not fully in use, left in place",
                        name, variable.position
                    );
                    report.stale_variables.push(name.clone());
                }
            }
        }

        info!(
            "Defragmented: {} bits moved, {} variables relocated",
            report.moved_bits, report.relocated_variables
        );
        report
    }

    /// Random values for every used cell; fails without changes if any is
    /// write-protected
    pub fn randomize_used(&mut self) -> Result<usize> {
        self.memory
            .randomize_used(&self.permissions, self.allocator.usage(), self.rng.as_mut())
    }

    /// Random values for every unused cell
    pub fn randomize_unused(&mut self) -> usize {
        self.memory
            .randomize_unused(self.allocator.usage(), self.rng.as_mut())
    }

    /// Random values for every cell; fails without changes if any is
    /// write-protected
    pub fn randomize_all(&mut self) -> Result<()> {
        self.memory
            .randomize_all(&self.permissions, self.rng.as_mut())
    }

    /// Majority-vote repair of the three copies. Returns the repaired count.
    pub fn correct(&mut self) -> usize {
        let repaired = self.memory.correct();
        if repaired > 0 {
            warn!("Corrected {} divergent bits", repaired);
        }
        repaired
    }

    /// Copy of everything a snapshot carries
    pub fn state(&self) -> EngineState {
        EngineState {
            config: self.config.clone(),
            memory: self.memory.clone(),
            allocator: self.allocator.clone(),
            permissions: self.permissions.clone(),
            variables: self.variables.clone(),
            paging: self.paging.clone(),
        }
    }

    pub fn save_state(&self) -> Result<Vec<u8>> {
        self.state().encode()
    }

    /// Replace the whole engine state with a snapshot. The random source
    /// is kept. On error the engine is unchanged.
    pub fn load_state(&mut self, blob: &[u8]) -> Result<()> {
        let state = EngineState::decode(blob)?;
        self.restore(state)
    }

    /// Adopt an already decoded state. It is validated first and the engine
    /// is left unchanged if any part is inconsistent.
    pub fn restore(&mut self, state: EngineState) -> Result<()> {
        state.validate()?;
        info!(
            "Restoring engine state ({} bits, {} variables)",
            state.config.size,
            state.variables.len()
        );
        self.config = state.config;
        self.memory = state.memory;
        self.allocator = state.allocator;
        self.permissions = state.permissions;
        self.variables = state.variables;
        self.paging = state.paging;
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let blob = self.save_state()?;
        std::fs::write(path.as_ref(), &blob)?;
        info!(
            "Saved {} byte snapshot to {}",
            blob.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let blob = std::fs::read(path.as_ref())?;
        self.load_state(&blob)
    }

    /// Pretty JSON of the full state
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state())?)
    }
}
