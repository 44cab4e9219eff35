//! Owner of both projections and the reducer that drives them.
//!
//! [`CtableState::reduce`] is a pure `(state, command) → (state, effects)`
//! step. Effects name the work the controller has to perform outside the
//! state: starting the minimum-frequency debounce, issuing a fetch, and
//! announcing freshly imported data. Fetch results come back as
//! [`Command::FetchCompleted`] carrying the id the fetch was issued with; only
//! the latest id is accepted.

use std::sync::Arc;

use log::{debug, warn};

use freqct_stats::AlphaLevel;

use crate::error::CtableError;
use crate::export::ExportPayload;
use crate::flat::FlatProjection;
use crate::form::validate_min_freq;
use crate::matrix::MatrixProjection;
use crate::model::{
    ColorMapping, CtDataResponse, CtQuery, CtSnapshot, Dimension, FlatSortColumn, MinFreqFilter,
    MinFreqType, Quantity, SortCriterion, ViewMode,
};
use crate::params::CtParams;
use crate::subcorpus::{AdHocSubcorpusDetector, adhoc_subcorpus_warning};

/// User actions and asynchronous results fed into the reducer.
#[derive(Debug)]
pub enum Command {
    /// Start over with new parameters and fetch them.
    Submit(CtParams),
    SetAlphaLevel(AlphaLevel),
    /// Raw minimum-frequency input, validated on every edit.
    SetMinFreq(String),
    SetMinFreqType(MinFreqType),
    /// The debounce period after the last minimum-frequency edit elapsed.
    ApplyMinFreq,
    SetEmptyVectorVisibility(bool),
    Transpose,
    SortByDimension(Dimension, SortCriterion),
    SetDisplayQuantity(Quantity),
    SetColorMapping(ColorMapping),
    SortFlat(FlatSortColumn),
    SetViewMode(ViewMode),
    /// Fetch the current parameters again.
    Reload,
    /// Import data that did not come from a fetch (e.g. embedded in a page).
    ImportData(CtDataResponse),
    FetchCompleted {
        request_id: u64,
        result: Result<CtDataResponse, CtableError>,
    },
    DismissError,
}

/// Work requested by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// (Re)start the debounce deadline for [`Command::ApplyMinFreq`].
    ScheduleMinFreqApply,
    Fetch {
        request_id: u64,
        query: CtQuery,
        conc_args: Vec<(String, String)>,
    },
    /// Freshly imported data for subscribers.
    NewData(Arc<CtSnapshot>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CtableState {
    pub matrix: MatrixProjection,
    pub flat: FlatProjection,
    pub mode: ViewMode,
    /// A fetch is in flight or a minimum-frequency edit awaits its debounce.
    pub is_waiting: bool,
    /// User-visible message of the last failure.
    pub error: Option<String>,
    pub min_freq_input: String,
    pub min_freq_type: MinFreqType,
    pub min_freq_invalid: bool,
    pub adhoc_warning: Option<String>,
    pending_min_freq: Option<MinFreqFilter>,
    /// Id and filter of the latest issued fetch.
    in_flight: Option<(u64, MinFreqFilter)>,
    next_request_id: u64,
    /// The matrix shows attr2 as rows; fetches and the flat list keep the
    /// submitted orientation.
    transposed: bool,
}

impl CtableState {
    pub fn new(params: CtParams) -> Self {
        Self {
            min_freq_input: params.min_freq.threshold_str(),
            min_freq_type: params.min_freq.kind,
            matrix: MatrixProjection::new(params.clone()),
            flat: FlatProjection::new(params),
            mode: ViewMode::default(),
            is_waiting: false,
            error: None,
            min_freq_invalid: false,
            adhoc_warning: None,
            pending_min_freq: None,
            in_flight: None,
            next_request_id: 1,
            transposed: false,
        }
    }

    /// State for a concordance that may be restricted to an ad-hoc subcorpus.
    pub fn with_detector(params: CtParams, detector: &dyn AdHocSubcorpusDetector) -> Self {
        Self {
            adhoc_warning: adhoc_subcorpus_warning(detector),
            ..Self::new(params)
        }
    }

    pub fn params(&self) -> &CtParams {
        self.matrix.params()
    }

    /// Id of the fetch whose response would currently be accepted.
    pub fn latest_request(&self) -> Option<u64> {
        self.in_flight.map(|(id, _)| id)
    }

    /// Whether the matrix is shown with its dimensions swapped.
    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    pub fn pending_min_freq(&self) -> Option<MinFreqFilter> {
        self.pending_min_freq
    }

    /// Export payload of the projection currently presented.
    pub fn export_payload(&self) -> ExportPayload {
        match self.mode {
            ViewMode::Matrix => ExportPayload::Matrix(self.matrix.export_data()),
            ViewMode::Flat => ExportPayload::Flat(self.flat.export_data()),
        }
    }

    pub fn reduce(&self, cmd: Command) -> (Self, Vec<Effect>) {
        let mut next = self.clone();
        let mut effects = Vec::new();
        debug!("reduce {}", command_name(&cmd));

        match cmd {
            Command::Submit(params) => {
                next = Self {
                    adhoc_warning: self.adhoc_warning.clone(),
                    next_request_id: self.next_request_id,
                    mode: self.mode,
                    ..Self::new(params.clone())
                };
                next.matrix = next
                    .matrix
                    .with_display_quantity(self.matrix.display_quantity())
                    .unwrap_or_else(|_| next.matrix.clone())
                    .with_color_mapping(self.matrix.color_mapping())
                    .with_empty_vectors_hidden(self.matrix.hide_empty_vectors());
                effects.push(next.issue_fetch(params.min_freq));
            }
            Command::SetAlphaLevel(level) => {
                next.matrix = self.matrix.with_alpha_level(level);
                next.flat = self.flat.with_alpha_level(level);
            }
            Command::SetMinFreq(input) => {
                next.min_freq_input = input;
                effects.extend(next.revalidate_min_freq());
            }
            Command::SetMinFreqType(kind) => {
                next.min_freq_type = kind;
                effects.extend(next.revalidate_min_freq());
            }
            Command::ApplyMinFreq => {
                if let Some(filter) = next.pending_min_freq.take() {
                    if self.params().requires_fetch(&filter) {
                        effects.push(next.issue_fetch(filter));
                    } else {
                        // Any fetch still in flight is superseded.
                        if let Some((id, _)) = next.in_flight.take() {
                            debug!("local refilter supersedes fetch {id}");
                        }
                        next.is_waiting = false;
                        next.apply(|s| {
                            s.matrix = s.matrix.with_min_freq(filter)?;
                            s.flat = s.flat.with_min_freq(filter)?;
                            Ok(())
                        });
                    }
                }
            }
            Command::SetEmptyVectorVisibility(hide) => {
                next.matrix = self.matrix.with_empty_vectors_hidden(hide);
            }
            Command::Transpose => {
                next.matrix = self.matrix.transposed();
                next.transposed = !self.transposed;
            }
            Command::SortByDimension(dim, criterion) => {
                next.apply(|s| {
                    s.matrix = s.matrix.sorted_by_dimension(dim, criterion)?;
                    Ok(())
                });
            }
            Command::SetDisplayQuantity(quantity) => {
                next.apply(|s| {
                    s.matrix = s.matrix.with_display_quantity(quantity)?;
                    Ok(())
                });
            }
            Command::SetColorMapping(mapping) => {
                next.matrix = self.matrix.with_color_mapping(mapping);
            }
            Command::SortFlat(column) => {
                next.apply(|s| {
                    s.flat = s.flat.sorted_by(column)?;
                    Ok(())
                });
            }
            Command::SetViewMode(mode) => {
                next.mode = mode;
            }
            Command::Reload => {
                let filter = self.params().min_freq;
                effects.push(next.issue_fetch(filter));
            }
            Command::ImportData(resp) => {
                let requested = self.params().min_freq;
                effects.push(next.import(&resp, requested));
            }
            Command::FetchCompleted { request_id, result } => match self.in_flight {
                Some((latest, filter)) if latest == request_id => {
                    next.in_flight = None;
                    next.is_waiting = next.pending_min_freq.is_some();
                    match result {
                        Ok(resp) => {
                            next.error = None;
                            effects.push(next.import(&resp, filter));
                        }
                        Err(e) => {
                            warn!("fetch {request_id} failed: {e}");
                            next.error = Some(e.to_string());
                        }
                    }
                }
                _ => {
                    debug!(
                        "dropping stale response {request_id} (latest {:?})",
                        self.latest_request()
                    );
                }
            },
            Command::DismissError => {
                next.error = None;
            }
        }

        (next, effects)
    }

    /// Run a fallible transform; on error the state keeps its projections and
    /// shows the message.
    fn apply(&mut self, f: impl FnOnce(&mut Self) -> Result<(), CtableError>) {
        let mut candidate = self.clone();
        match f(&mut candidate) {
            Ok(()) => {
                *self = candidate;
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn revalidate_min_freq(&mut self) -> Option<Effect> {
        let checked = validate_min_freq(&self.min_freq_input, self.min_freq_type).and_then(|t| {
            let filter = MinFreqFilter::new(self.min_freq_type, t);
            self.params().ensure_quantity(filter.kind.quantity())?;
            Ok(filter)
        });
        match checked {
            Ok(filter) => {
                self.min_freq_invalid = false;
                self.error = None;
                self.pending_min_freq = Some(filter);
                self.is_waiting = true;
                Some(Effect::ScheduleMinFreqApply)
            }
            Err(e) => {
                self.min_freq_invalid = true;
                self.error = Some(e.to_string());
                self.pending_min_freq = None;
                self.is_waiting = self.in_flight.is_some();
                None
            }
        }
    }

    fn issue_fetch(&mut self, filter: MinFreqFilter) -> Effect {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight = Some((request_id, filter));
        self.is_waiting = true;
        debug!("issuing fetch {request_id} with {} {}", filter.kind, filter.threshold);
        Effect::Fetch {
            request_id,
            query: self.flat.params().query_with(&filter),
            conc_args: self.flat.params().conc_args.clone(),
        }
    }

    fn import(&mut self, resp: &CtDataResponse, requested: MinFreqFilter) -> Effect {
        let (matrix, snapshot) = if self.transposed {
            let (matrix, snapshot) = self.matrix.transposed().import_data(resp, requested);
            (matrix.transposed(), snapshot)
        } else {
            self.matrix.import_data(resp, requested)
        };
        self.matrix = matrix;
        self.flat = self.flat.with_snapshot(&snapshot);
        self.min_freq_input = requested.threshold_str();
        self.min_freq_type = requested.kind;
        self.min_freq_invalid = false;
        Effect::NewData(snapshot)
    }
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Submit(_) => "submit",
        Command::SetAlphaLevel(_) => "set_alpha_level",
        Command::SetMinFreq(_) => "set_min_freq",
        Command::SetMinFreqType(_) => "set_min_freq_type",
        Command::ApplyMinFreq => "apply_min_freq",
        Command::SetEmptyVectorVisibility(_) => "set_empty_vector_visibility",
        Command::Transpose => "transpose",
        Command::SortByDimension(..) => "sort_by_dimension",
        Command::SetDisplayQuantity(_) => "set_display_quantity",
        Command::SetColorMapping(_) => "set_color_mapping",
        Command::SortFlat(_) => "sort_flat",
        Command::SetViewMode(_) => "set_view_mode",
        Command::Reload => "reload",
        Command::ImportData(_) => "import_data",
        Command::FetchCompleted { .. } => "fetch_completed",
        Command::DismissError => "dismiss_error",
    }
}

/// Free-function form of [`CtableState::reduce`].
pub fn reduce(state: &CtableState, cmd: Command) -> (CtableState, Vec<Effect>) {
    state.reduce(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CtDataRow, CtFreqFormArgs};

    fn response(threshold: &str, rows: &[(&str, &str, u64)]) -> CtDataResponse {
        CtDataResponse {
            data: rows
                .iter()
                .map(|&(a, b, abs)| CtDataRow(a.into(), b.into(), abs, 1000))
                .collect(),
            full_size: rows.len() as u64,
            ctfreq_form_args: CtFreqFormArgs {
                ctminfreq: threshold.into(),
                ctminfreq_type: Some("abs".into()),
                ..CtFreqFormArgs::default()
            },
        }
    }

    fn loaded() -> CtableState {
        let (state, effects) = CtableState::new(CtParams::new("word", "tag"))
            .reduce(Command::ImportData(response(
                "1",
                &[("cat", "NN", 10), ("dog", "NN", 3), ("dog", "VB", 1)],
            )));
        assert!(matches!(effects[0], Effect::NewData(_)));
        state
    }

    fn fetch_id(effects: &[Effect]) -> u64 {
        match effects {
            [Effect::Fetch { request_id, .. }] => *request_id,
            other => panic!("expected one fetch, got {other:?}"),
        }
    }

    #[test]
    fn test_import_syncs_both_projections() {
        let state = loaded();
        assert_eq!(state.matrix.origin_len(), 3);
        assert_eq!(state.flat.cells().len(), 3);
        assert_eq!(*state.matrix.snapshot(), CtSnapshot {
            params: state.flat.params().clone(),
            cells: state.flat.cells().to_vec(),
        });
    }

    #[test]
    fn test_invalid_min_freq_issues_nothing() {
        let (state, effects) = loaded().reduce(Command::SetMinFreq("abc".into()));
        assert!(effects.is_empty());
        assert!(state.min_freq_invalid);
        assert!(state.error.is_some());
        assert!(!state.is_waiting);
        assert_eq!(state.pending_min_freq(), None);
    }

    #[test]
    fn test_higher_threshold_filters_locally() {
        let (state, effects) = loaded().reduce(Command::SetMinFreq("5".into()));
        assert_eq!(effects, vec![Effect::ScheduleMinFreqApply]);
        assert!(state.is_waiting);

        let (state, effects) = state.reduce(Command::ApplyMinFreq);
        assert!(effects.is_empty());
        assert!(!state.is_waiting);
        assert_eq!(state.matrix.data().len(), 1);
        assert_eq!(state.flat.rows().len(), 1);
    }

    #[test]
    fn test_lower_threshold_fetches() {
        let (state, _) = loaded().reduce(Command::SetMinFreq("0".into()));
        let (state, effects) = state.reduce(Command::ApplyMinFreq);
        let id = fetch_id(&effects);
        match &effects[0] {
            Effect::Fetch { query, .. } => assert_eq!(query.ctminfreq, "0"),
            _ => unreachable!(),
        }
        assert!(state.is_waiting);
        assert_eq!(state.latest_request(), Some(id));
    }

    #[test]
    fn test_type_change_fetches() {
        let (state, _) = loaded().reduce(Command::SetMinFreqType(MinFreqType::PercentileAbs));
        let (_, effects) = state.reduce(Command::ApplyMinFreq);
        fetch_id(&effects);
    }

    #[test]
    fn test_stale_response_dropped() {
        let (state, effects) = loaded().reduce(Command::Reload);
        let first = fetch_id(&effects);
        let (state, effects) = state.reduce(Command::Reload);
        let second = fetch_id(&effects);
        assert!(second > first);

        let (state, effects) = state.reduce(Command::FetchCompleted {
            request_id: first,
            result: Ok(response("1", &[("stale", "X", 1)])),
        });
        assert!(effects.is_empty());
        assert!(state.is_waiting);
        assert!(state.matrix.cell("stale", "X").is_none());

        let (state, effects) = state.reduce(Command::FetchCompleted {
            request_id: second,
            result: Ok(response("1", &[("fresh", "X", 2)])),
        });
        assert!(matches!(effects[..], [Effect::NewData(_)]));
        assert!(!state.is_waiting);
        assert!(state.matrix.cell("fresh", "X").is_some());
        assert_eq!(state.flat.rows()[0].val1, "fresh");
    }

    #[test]
    fn test_failure_keeps_data() {
        let before = loaded();
        let (state, effects) = before.reduce(Command::Reload);
        let id = fetch_id(&effects);
        let (state, effects) = state.reduce(Command::FetchCompleted {
            request_id: id,
            result: Err(CtableError::Network("connection refused".into())),
        });
        assert!(effects.is_empty());
        assert!(!state.is_waiting);
        assert!(state.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(state.matrix, before.matrix);
        assert_eq!(state.flat, before.flat);

        let (state, _) = state.reduce(Command::DismissError);
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_failed_transform_keeps_state() {
        let mut params = CtParams::new("doc.genre", "text.year");
        params.min_freq = MinFreqFilter::new(MinFreqType::Abs, 0.0);
        let (state, _) = CtableState::new(params)
            .reduce(Command::ImportData(response("0", &[("news", "1990", 2)])));
        let (next, effects) = state.reduce(Command::SetDisplayQuantity(Quantity::Ipm));
        assert!(effects.is_empty());
        assert_eq!(next.matrix, state.matrix);
        assert!(next.error.is_some());

        let (next, effects) = state.reduce(Command::SetMinFreqType(MinFreqType::Ipm));
        assert!(effects.is_empty());
        assert!(next.min_freq_invalid);
    }

    #[test]
    fn test_export_follows_view_mode() {
        let state = loaded();
        assert!(matches!(state.export_payload(), ExportPayload::Matrix(_)));
        let (state, _) = state.reduce(Command::SetViewMode(ViewMode::Flat));
        match state.export_payload() {
            ExportPayload::Flat(f) => assert_eq!(f.data.len(), 3),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_submit_resets_and_fetches() {
        let state = loaded();
        let mut params = CtParams::new("lemma", "tag");
        params.min_freq = MinFreqFilter::new(MinFreqType::Abs, 2.0);
        let (state, effects) = state.reduce(Command::Submit(params));
        let id = fetch_id(&effects);
        assert!(state.matrix.is_empty());
        assert_eq!(state.min_freq_input, "2");
        assert_eq!(state.latest_request(), Some(id));
        match &effects[0] {
            Effect::Fetch { query, .. } => assert_eq!(query.ctattr1, "lemma"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_matrix_commands() {
        let state = loaded();
        let (state, _) = state.reduce(Command::Transpose);
        assert_eq!(state.params().attr1, "tag");
        let (state, _) = state.reduce(Command::SortByDimension(Dimension::Columns, SortCriterion::Attr));
        assert_eq!(state.matrix.visible_labels(Dimension::Columns), vec!["cat", "dog"]);
        let (state, _) = state.reduce(Command::SetColorMapping(ColorMapping::Percentile));
        assert_eq!(state.matrix.color_mapping(), ColorMapping::Percentile);
        let (state, _) = state.reduce(Command::SortFlat(FlatSortColumn::Attr1));
        assert_eq!(state.flat.sort_by(), FlatSortColumn::Attr1);
    }

    #[test]
    fn test_local_refilter_supersedes_pending_fetch() {
        let (state, _) = loaded().reduce(Command::SetMinFreq("0".into()));
        let (state, effects) = state.reduce(Command::ApplyMinFreq);
        let id = fetch_id(&effects);

        let (state, _) = state.reduce(Command::SetMinFreq("5".into()));
        let (state, effects) = state.reduce(Command::ApplyMinFreq);
        assert!(effects.is_empty());
        assert!(!state.is_waiting);
        assert_eq!(state.latest_request(), None);

        let (state, effects) = state.reduce(Command::FetchCompleted {
            request_id: id,
            result: Ok(response(
                "0",
                &[("cat", "NN", 10), ("dog", "NN", 3), ("dog", "VB", 1), ("ant", "VB", 0)],
            )),
        });
        assert!(effects.is_empty());
        assert_eq!(state.min_freq_input, "5");
        assert_eq!(state.params().min_freq, MinFreqFilter::new(MinFreqType::Abs, 5.0));
        assert!(state.matrix.cell("cat", "NN").is_some());
        assert!(state.matrix.cell("dog", "NN").is_none());
        assert_eq!(state.flat.rows().len(), 1);
    }

    #[test]
    fn test_refetch_after_transpose_keeps_orientations() {
        let (state, _) = loaded().reduce(Command::Transpose);
        assert!(state.is_transposed());
        let (state, effects) = state.reduce(Command::Reload);
        let id = fetch_id(&effects);
        match &effects[0] {
            Effect::Fetch { query, .. } => {
                assert_eq!(query.ctattr1, "word");
                assert_eq!(query.ctattr2, "tag");
            }
            _ => unreachable!(),
        }

        let (state, _) = state.reduce(Command::FetchCompleted {
            request_id: id,
            result: Ok(response("1", &[("cat", "NN", 10), ("dog", "VB", 2)])),
        });
        assert_eq!(state.params().attr1, "tag");
        assert!(state.matrix.cell("NN", "cat").is_some());
        assert_eq!(state.flat.params().attr1, "word");
        assert_eq!(state.flat.export_data().headings[0], "word");
        assert_eq!(state.flat.rows()[0].val1, "cat");

        let (state, _) = state.reduce(Command::Transpose);
        assert!(!state.is_transposed());
        assert_eq!(state.params().attr1, "word");
        assert!(state.matrix.cell("dog", "VB").is_some());
    }
}
