//! Collaborator seams: per-stage row services and column annotations.

use std::collections::{BTreeMap, BTreeSet};

use crate::callback::EnumRowCallback;
use crate::config::SpecTickContext;
use crate::error::PipelineResult;
use crate::spec::SpecTickState;

////////////////////////////////////////////////////////////////////////////////
// #region TickService

/// Row transform owned by one stage (import, export or process).
///
/// Every hook receives the state by value and returns the state that
/// continues the tick. `run` may rewrite any field, including `offset`.
pub trait TickService {
    fn prepare(&mut self, state: SpecTickState, _ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        Ok(state)
    }

    fn run(&mut self, state: SpecTickState, ctx: &SpecTickContext) -> PipelineResult<SpecTickState>;

    fn done(&mut self, state: SpecTickState, _ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        Ok(state)
    }

    /// Callbacks applied to `state.row` after each tick.
    fn callbacks(&self) -> &[EnumRowCallback] {
        &[]
    }
}

/// Service that returns every state untouched.
#[derive(Debug, Clone, Default)]
pub struct PassthroughService {
    callbacks: Vec<EnumRowCallback>,
}

impl PassthroughService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callbacks(callbacks: Vec<EnumRowCallback>) -> Self {
        Self { callbacks }
    }
}

impl TickService for PassthroughService {
    fn run(&mut self, state: SpecTickState, _ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        Ok(state)
    }

    fn callbacks(&self) -> &[EnumRowCallback] {
        &self.callbacks
    }
}

/// Service whose `run` is a closure.
pub struct FnTickService<F> {
    fn_run: F,
    callbacks: Vec<EnumRowCallback>,
}

impl<F> FnTickService<F>
where
    F: FnMut(SpecTickState, &SpecTickContext) -> PipelineResult<SpecTickState>,
{
    pub fn new(fn_run: F) -> Self {
        Self {
            fn_run,
            callbacks: vec![],
        }
    }

    pub fn with_callbacks(mut self, callbacks: Vec<EnumRowCallback>) -> Self {
        self.callbacks = callbacks;
        self
    }
}

impl<F> TickService for FnTickService<F>
where
    F: FnMut(SpecTickState, &SpecTickContext) -> PipelineResult<SpecTickState>,
{
    fn run(&mut self, state: SpecTickState, ctx: &SpecTickContext) -> PipelineResult<SpecTickState> {
        (self.fn_run)(state, ctx)
    }

    fn callbacks(&self) -> &[EnumRowCallback] {
        &self.callbacks
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnAnnotations

/// Per-column visibility and display labels.
pub trait ColumnAnnotations {
    fn is_hidden(&self, column: &str) -> bool;

    fn label(&self, column: &str) -> String {
        column.to_string()
    }
}

/// Static annotations: a hidden-column set and optional labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecColumnAnnotations {
    pub set_hidden: BTreeSet<String>,
    pub dict_labels: BTreeMap<String, String>,
}

impl SpecColumnAnnotations {
    pub fn with_hidden<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set_hidden: columns.into_iter().map(Into::into).collect(),
            dict_labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, column: impl Into<String>, label: impl Into<String>) -> Self {
        self.dict_labels.insert(column.into(), label.into());
        self
    }
}

impl ColumnAnnotations for SpecColumnAnnotations {
    fn is_hidden(&self, column: &str) -> bool {
        self.set_hidden.contains(column)
    }

    fn label(&self, column: &str) -> String {
        self.dict_labels
            .get(column)
            .cloned()
            .unwrap_or_else(|| column.to_string())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
