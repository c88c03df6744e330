//! Formula evaluation and recalculation.
//!
//! Evaluation is pull-based: a formula evaluates any unevaluated formula it
//! reads before substituting values. Recalculation is push-based: an edited
//! cell is re-evaluated and then its formula dependents in topological order.

use std::time::Instant;

use log::debug;
use rustc_hash::FxHashMap;

use crate::cell::{CellFlags, CellType};
use crate::cell_ref::CellRef;
use crate::error::{is_error_code, EngineError};
use crate::formula::eval::Value;
use crate::formula::tokenizer::{expand_ranges, references, tokenize, Token};
use crate::formula::{format_date_time, parse_date_time, run, substitute};
use crate::sheet::Sheet;

/// Summary of a full recalculation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecalcReport {
    /// Formula cells covered by the pass
    pub formula_cells: usize,
    /// Formula cells whose display ended up as an error code, row-major
    pub error_cells: Vec<CellRef>,
    pub duration_ms: u64,
}

impl RecalcReport {
    /// Fold another sheet's report into this one.
    pub fn merge(&mut self, other: RecalcReport) {
        self.formula_cells += other.formula_cells;
        self.error_cells.extend(other.error_cells);
        self.duration_ms += other.duration_ms;
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{} formulas in {}ms, errors={}",
            self.formula_cells,
            self.duration_ms,
            self.error_cells.len()
        )
    }
}

impl Sheet {
    /// Evaluate a formula cell if it is not already evaluated.
    ///
    /// Non-formula and already-evaluated cells are a no-op. Failures are
    /// written into the cell's display as an error code, the cell is marked
    /// evaluated either way, and the error is returned.
    ///
    /// Unevaluated formulas the cell reads are evaluated first. They are
    /// kept on an explicit stack, so chain length is bounded only by memory.
    pub fn evaluate_cell(&mut self, at: CellRef) -> Result<(), EngineError> {
        let mut outcome = Ok(());
        let mut stack = vec![at];
        // Tokens of cells whose edges are installed but which still wait on a read
        let mut prepared: FxHashMap<CellRef, Vec<Token>> = FxHashMap::default();

        while let Some(&top) = stack.last() {
            if !self.is_pending(top) {
                stack.pop();
                continue;
            }
            if !prepared.contains_key(&top) {
                match self.prepare(top) {
                    Ok(tokens) => {
                        prepared.insert(top, tokens);
                    }
                    Err(err) => {
                        stack.pop();
                        let result = self.finish(top, Err(err));
                        self.settle(at, top, result, &mut outcome);
                        continue;
                    }
                }
            }

            let waiting: Vec<CellRef> = self
                .cells
                .get(&top)
                .map(|cell| {
                    cell.depends_on
                        .iter()
                        .copied()
                        .filter(|target| self.is_pending(*target) && !prepared.contains_key(target))
                        .collect()
                })
                .unwrap_or_default();
            if !waiting.is_empty() {
                stack.extend(waiting.into_iter().rev());
                continue;
            }

            stack.pop();
            let tokens = prepared.remove(&top).unwrap_or_default();
            let (expression, env) = substitute(&tokens, |text| self.parameter_value(text));
            let result = run(&expression, &env, &self.functions);
            let result = self.finish(top, result);
            self.settle(at, top, result, &mut outcome);
        }
        outcome
    }

    fn is_pending(&self, at: CellRef) -> bool {
        self.cells
            .get(&at)
            .is_some_and(|c| c.is_formula() && !c.is_evaluated())
    }

    /// Tokenize a pending formula, check it for cycles and install its edges.
    fn prepare(&mut self, at: CellRef) -> Result<Vec<Token>, EngineError> {
        let body = self
            .cells
            .get(&at)
            .and_then(|c| c.formula_body())
            .unwrap_or_default()
            .to_string();
        let tokens = tokenize(&expand_ranges(&body)?);
        let refs = references(&tokens)?;
        if self.find_cycle(at, &refs).is_some() {
            debug!("{}: {} is part of a cycle", self.name, at);
            return Err(EngineError::Cycle { cell: at });
        }
        self.install_edges(at, &refs);
        Ok(tokens)
    }

    /// Keep the outcome of the requested cell; log the rest.
    fn settle(
        &self,
        requested: CellRef,
        at: CellRef,
        result: Result<(), EngineError>,
        outcome: &mut Result<(), EngineError>,
    ) {
        if at == requested {
            *outcome = result;
        } else if let Err(err) = result {
            debug!("{}: {} read by {} failed: {}", self.name, at, requested, err);
        }
    }

    /// Value a reference contributes to a formula: the number its display
    /// reads as, otherwise the display text.
    fn parameter_value(&self, text: &str) -> Value {
        let Some(cell) = CellRef::parse(text).ok().and_then(|at| self.cells.get(&at)) else {
            return Value::Text(String::new());
        };
        match cell.number_format.parse(&cell.display) {
            Some(n) => Value::Number(n),
            None => Value::Text(cell.display.trim().to_string()),
        }
    }

    /// Write an evaluation outcome into the cell.
    fn finish(&mut self, at: CellRef, result: Result<Value, EngineError>) -> Result<(), EngineError> {
        let Some(cell) = self.cells.get_mut(&at) else {
            return result.map(|_| ());
        };
        cell.set_flag(CellFlags::FORMULA, true);
        cell.set_flag(CellFlags::EVALUATED, true);

        match result {
            Ok(Value::Number(n)) => {
                if cell.kind == CellType::DateTime {
                    cell.kind = CellType::String;
                }
                cell.display = cell.render_number(n);
                Ok(())
            }
            Ok(Value::Text(text)) => {
                match parse_date_time(&text) {
                    Some(parsed) => {
                        cell.kind = CellType::DateTime;
                        cell.display = format_date_time(&parsed, cell.date_time_format);
                    }
                    None => {
                        if cell.kind == CellType::DateTime {
                            cell.kind = CellType::String;
                        }
                        cell.display = text;
                    }
                }
                Ok(())
            }
            Ok(Value::Boolean(b)) => {
                if cell.kind == CellType::DateTime {
                    cell.kind = CellType::String;
                }
                cell.display = if b { "TRUE".into() } else { "FALSE".into() };
                Ok(())
            }
            Err(err) => {
                cell.display = err.code().to_string();
                Err(err)
            }
        }
    }

    /// Re-evaluate `at`, then every formula reading it, transitively, each
    /// after everything it reads.
    ///
    /// Visible cells whose display was refreshed are queued for the renderer.
    pub fn recalculate_cell(&mut self, at: CellRef) {
        let Some(cell) = self.cells.get_mut(&at) else {
            return;
        };
        cell.set_flag(CellFlags::EVALUATED, false);

        let order = self.dependents_in_order(at);
        for dependent in &order {
            if let Some(cell) = self.cells.get_mut(dependent) {
                cell.set_flag(CellFlags::EVALUATED, false);
            }
        }

        for current in std::iter::once(at).chain(order) {
            if self.cells.get(&current).is_some_and(|c| c.is_formula()) {
                if let Err(err) = self.evaluate_cell(current) {
                    debug!("{}: {} = {}", self.name, current, err);
                }
            }
            if self.viewport.is_visible(current) {
                self.visible_updates.insert(current);
            }
        }
    }

    /// Clear the evaluated flag on every formula cell.
    pub fn invalidate_formulas(&mut self) {
        for cell in self.cells.values_mut() {
            if cell.is_formula() {
                cell.set_flag(CellFlags::EVALUATED, false);
            }
        }
    }

    /// Evaluate every formula cell still unevaluated, in row-major order.
    /// Each evaluation pulls in whatever it reads, so order is not significant.
    pub fn evaluate_pending(&mut self) -> RecalcReport {
        let start = Instant::now();
        let formulas: Vec<CellRef> = self
            .sorted_refs()
            .into_iter()
            .filter(|at| self.cells.get(at).is_some_and(|c| c.is_formula()))
            .collect();

        let mut report = RecalcReport::default();
        for &at in &formulas {
            let pending = self.cells.get(&at).is_some_and(|c| !c.is_evaluated());
            if pending {
                // Failures are already in the display
                let _ = self.evaluate_cell(at);
            }
            report.formula_cells += 1;
            if self.viewport.is_visible(at) {
                self.visible_updates.insert(at);
            }
        }
        report.error_cells = formulas
            .into_iter()
            .filter(|at| is_error_code(self.display(*at)))
            .collect();
        report.duration_ms = start.elapsed().as_millis() as u64;
        debug!("{}: recalc {}", self.name, report.summary());
        report
    }

    /// Two-pass bulk recalculation: invalidate every formula, then evaluate.
    pub fn recalculate_all(&mut self) -> RecalcReport {
        self.invalidate_formulas();
        self.evaluate_pending()
    }
}
