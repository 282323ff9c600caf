//! Parser for spreadsheet rows, one call per row.
//!
//! The first row is a header naming the columns. Sheets whose header has
//! neither `FLUXO` nor `INDICADOR` are read as a plain weighted edge list
//! (`source, target, value`).

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use ura_core::data_processors::{split_pipe_values, weekday_from_index, TimestampProcessor};
use ura_core::error::{FlowError, Result};
use ura_core::models::{Cell, GraphSnapshot, InputFormat, UNKNOWN_PRODUCT};

use crate::aggregator::hour_and_weekday;
use crate::loops::LoopStrategy;
use crate::normalizer::{RawStep, StepNormalizer};
use crate::pipeline::{AnalysisOptions, CallRecord, SnapshotAssembler};

/// Header names understood by the row parser.
pub mod columns {
    pub const DATA_REF: &str = "DATA_REF";
    pub const HORA_REF: &str = "HORA_REF";
    pub const DIA_DA_SEMANA: &str = "DIA_DA_SEMANA";
    pub const HORA_INTEIRA: &str = "HORA_INTEIRA";
    pub const COD_IDENTIFICACAO_LIGACAO: &str = "COD_IDENTIFICACAO_LIGACAO";
    pub const FLUXO: &str = "FLUXO";
    pub const INDICADOR: &str = "INDICADOR";
    pub const DURACAO: &str = "DURACAO";
    pub const PRODUTO: &str = "PRODUTO";
    pub const TIPO_SERVICO: &str = "TIPO_SERVICO";
    pub const ULTIMO_PONTO: &str = "ULTIMO_PONTO";
    pub const TMP_TIMESTAMP: &str = "TMP_TIMESTAMP";
}

static EMPTY: Cell = Cell::Empty;

// ── ColumnIndex ───────────────────────────────────────────────────────────────

/// Positions of the known columns in the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    pub data_ref: Option<usize>,
    pub hora_ref: Option<usize>,
    pub dia_da_semana: Option<usize>,
    pub hora_inteira: Option<usize>,
    pub cod_ligacao: Option<usize>,
    pub fluxo: usize,
    pub indicador: usize,
    pub duracao: Option<usize>,
    pub produto: Option<usize>,
    pub tipo_servico: Option<usize>,
    pub ultimo_ponto: Option<usize>,
    pub tmp_timestamp: Option<usize>,
}

impl ColumnIndex {
    /// Resolve column positions; `FLUXO` and `INDICADOR` are mandatory.
    pub fn resolve(header: &[Cell]) -> Result<Self> {
        let names: Vec<String> = header.iter().map(Cell::to_text).collect();
        let find = |name: &str| names.iter().position(|h| h.eq_ignore_ascii_case(name));

        let (fluxo, indicador) = match (find(columns::FLUXO), find(columns::INDICADOR)) {
            (Some(f), Some(i)) => (f, i),
            (f, i) => {
                let missing = [(f, columns::FLUXO), (i, columns::INDICADOR)]
                    .into_iter()
                    .filter(|(pos, _)| pos.is_none())
                    .map(|(_, name)| name.to_string())
                    .collect();
                return Err(FlowError::MissingColumns(missing));
            }
        };

        Ok(Self {
            data_ref: find(columns::DATA_REF),
            hora_ref: find(columns::HORA_REF),
            dia_da_semana: find(columns::DIA_DA_SEMANA),
            hora_inteira: find(columns::HORA_INTEIRA),
            cod_ligacao: find(columns::COD_IDENTIFICACAO_LIGACAO),
            fluxo,
            indicador,
            duracao: find(columns::DURACAO),
            produto: find(columns::PRODUTO),
            tipo_servico: find(columns::TIPO_SERVICO),
            ultimo_ponto: find(columns::ULTIMO_PONTO),
            tmp_timestamp: find(columns::TMP_TIMESTAMP),
        })
    }
}

/// `true` when the header names the call-per-row layout.
pub fn is_call_sheet(header: &[Cell]) -> bool {
    header.iter().map(Cell::to_text).any(|h| {
        h.eq_ignore_ascii_case(columns::FLUXO) || h.eq_ignore_ascii_case(columns::INDICADOR)
    })
}

/// Cell at an optional column, `Empty` when absent.
fn cell(row: &[Cell], column: Option<usize>) -> &Cell {
    column.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
}

fn text(row: &[Cell], column: Option<usize>) -> Option<String> {
    let value = cell(row, column).to_text();
    (!value.is_empty()).then_some(value)
}

// ── Call rows ─────────────────────────────────────────────────────────────────

/// Parse a call-per-row sheet.
///
/// Rows with an empty `FLUXO` or without any valid step are reported as
/// skipped and do not stop the batch. Blank rows are ignored. Steps are
/// cleaned with the regressive loop trim.
pub fn parse_tabular_rows(rows: &[Vec<Cell>], options: &AnalysisOptions) -> Result<GraphSnapshot> {
    let Some((header, data)) = rows.split_first() else {
        return Err(FlowError::EmptySpreadsheet);
    };
    let columns = ColumnIndex::resolve(header)?;
    let normalizer = StepNormalizer::new(&options.taxonomy);
    let mut assembler = SnapshotAssembler::new(InputFormat::Tabular, LoopStrategy::Regressive, options);

    for (offset, row) in data.iter().enumerate() {
        // Header is spreadsheet row 1.
        let row_number = offset + 2;
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        if let Err(err) = add_row(&mut assembler, &normalizer, &columns, row, row_number) {
            match err {
                FlowError::MalformedRow { row, reason } => {
                    warn!("Skipping spreadsheet row {}: {}", row, reason);
                    assembler.skip_row(row, reason);
                }
                other => return Err(other),
            }
        }
    }

    if assembler.call_count() == 0 {
        warn!("Spreadsheet has no rows with valid navigation steps");
        return Err(FlowError::NoValidSteps);
    }
    Ok(assembler.finish())
}

fn add_row(
    assembler: &mut SnapshotAssembler<'_>,
    normalizer: &StepNormalizer<'_>,
    columns: &ColumnIndex,
    row: &[Cell],
    row_number: usize,
) -> Result<()> {
    let malformed = |reason: &str| FlowError::MalformedRow {
        row: row_number,
        reason: reason.to_string(),
    };

    let flow = text(row, Some(columns.fluxo)).ok_or_else(|| malformed("empty FLUXO"))?;
    let tokens = split_pipe_values(&flow);
    if tokens.is_empty() {
        return Err(malformed("FLUXO has no step names"));
    }

    let id = text(row, columns.cod_ligacao).unwrap_or_else(|| format!("linha-{row_number}"));
    let started_at = TimestampProcessor::combine_date_time(
        cell(row, columns.data_ref),
        columns.hora_ref.and_then(|c| row.get(c)),
    );
    let stamps: Vec<Option<NaiveDateTime>> = text(row, columns.tmp_timestamp)
        .map(|t| split_pipe_values(&t))
        .unwrap_or_default()
        .iter()
        .map(|t| TimestampProcessor::parse_str(t))
        .collect();
    let started_at = started_at.or_else(|| stamps.iter().flatten().next().copied());
    let service_type = text(row, columns.tipo_servico);
    let last_point = text(row, columns.ultimo_ponto).unwrap_or_default();

    let last_index = tokens.len() - 1;
    let steps = normalizer.normalize(tokens.into_iter().enumerate().map(|(i, menu_name)| RawStep {
        session_id: id.clone(),
        timestamp: stamps.get(i).copied().flatten().or(started_at),
        menu_name,
        event_name: None,
        point_code: if i == last_index { last_point.clone() } else { String::new() },
        service_type: service_type.clone(),
    }));
    assembler.extend_steps(steps.all);
    if steps.valid.is_empty() {
        return Err(malformed("FLUXO has only noise steps"));
    }

    let derived = started_at.as_ref().map(hour_and_weekday);
    let hour = cell(row, columns.hora_inteira)
        .as_number()
        .filter(|h| (0.0..24.0).contains(h))
        .map(|h| h as u32)
        .or(derived.as_ref().map(|(h, _)| *h));
    let weekday = weekday_cell(cell(row, columns.dia_da_semana))
        .or_else(|| derived.map(|(_, w)| w));
    let duration_seconds = cell(row, columns.duracao)
        .as_number()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d as u64)
        .unwrap_or(0);
    let product = text(row, columns.produto).unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());
    let indicator = text(row, Some(columns.indicador));

    assembler.add_call(
        CallRecord {
            id,
            indicator: indicator.as_deref(),
            termination_reason: None,
            duration_seconds,
            hour,
            weekday,
            product,
        },
        steps.valid,
    );
    Ok(())
}

/// `DIA_DA_SEMANA` as a label: `0..=6` indexes from Sunday, text is kept.
fn weekday_cell(value: &Cell) -> Option<String> {
    if value.is_blank() {
        return None;
    }
    match value.as_number() {
        Some(n) if n.fract() == 0.0 && n >= 0.0 => {
            weekday_from_index(n as u32).map(str::to_string)
        }
        Some(_) => None,
        None => Some(value.to_text()),
    }
}

// ── Edge-list sheets ──────────────────────────────────────────────────────────

/// Parse a plain `source, target, value` sheet.
///
/// The first row is a header when its third cell is not numeric. Rows with
/// fewer than two cells or an empty endpoint are skipped; a missing or
/// invalid value counts as 1.
pub fn parse_edge_list(rows: &[Vec<Cell>], options: &AnalysisOptions) -> Result<GraphSnapshot> {
    if rows.is_empty() {
        return Err(FlowError::EmptySpreadsheet);
    }
    let has_header = rows[0].get(2).and_then(Cell::as_number).is_none();
    let skip = usize::from(has_header);

    let mut assembler = SnapshotAssembler::new(InputFormat::Tabular, LoopStrategy::FirstSeen, options);
    for (offset, row) in rows.iter().enumerate().skip(skip) {
        let row_number = offset + 1;
        if row.len() < 2 {
            assembler.skip_row(row_number, "fewer than 2 columns");
            continue;
        }
        let (source, target) = (row[0].to_text(), row[1].to_text());
        if source.is_empty() || target.is_empty() {
            assembler.skip_row(row_number, "empty source or target");
            continue;
        }
        let weight = row
            .get(2)
            .and_then(Cell::as_number)
            .filter(|v| v.is_finite() && *v >= 1.0)
            .map(|v| v.round() as u64)
            .unwrap_or(1);
        assembler.add_weighted_edge(&source, &target, weight);
    }

    if !assembler.has_edges() {
        warn!("Edge-list sheet has no usable rows");
        return Err(FlowError::NoValidSteps);
    }
    debug!("Edge-list sheet parsed");
    assembler.infer_kinds_from_degree();
    Ok(assembler.finish())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ura_core::models::{EndState, NodeKind};

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    fn header() -> Vec<Cell> {
        row(&[
            "DATA_REF",
            "HORA_REF",
            "DIA_DA_SEMANA",
            "HORA_INTEIRA",
            "COD_IDENTIFICACAO_LIGACAO",
            "FLUXO",
            "INDICADOR",
            "DURACAO",
            "PRODUTO",
            "TIPO_SERVICO",
            "ULTIMO_PONTO",
            "TMP_TIMESTAMP",
        ])
    }

    fn call(id: &str, flow: &str, indicator: &str) -> Vec<Cell> {
        row(&["27/11/2025", "10:15:00", "", "", id, flow, indicator, "120", "Cartao", "", "9001", ""])
    }

    fn parse(rows: &[Vec<Cell>]) -> Result<GraphSnapshot> {
        parse_tabular_rows(rows, &AnalysisOptions::default())
    }

    // ── ColumnIndex ───────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_columns() {
        let index = ColumnIndex::resolve(&header()).unwrap();
        assert_eq!(index.fluxo, 5);
        assert_eq!(index.indicador, 6);
        assert_eq!(index.tmp_timestamp, Some(11));
    }

    #[test]
    fn test_resolve_reports_missing_columns() {
        let err = ColumnIndex::resolve(&row(&["FLUXO", "PRODUTO"])).unwrap_err();
        match err {
            FlowError::MissingColumns(missing) => assert_eq!(missing, vec!["INDICADOR"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    // ── parse_tabular_rows ────────────────────────────────────────────────────

    #[test]
    fn test_regressive_trim_across_rows() {
        let rows = vec![
            header(),
            call("1", "X|Y|X|Z", "Desconexao"),
            call("2", "X|Y|Z", "Desconexao"),
        ];
        let snapshot = parse(&rows).unwrap();

        assert_eq!(snapshot.journeys[0].ordered_step_names, vec!["X", "Z"]);
        assert_eq!(snapshot.journeys[1].ordered_step_names, vec!["X", "Y", "Z"]);
        let weight = |s: &str, t: &str| snapshot.edge(s, t).map(|e| e.weight);
        assert_eq!(weight("X", "Z"), Some(1));
        assert_eq!(weight("X", "Y"), Some(1));
        assert_eq!(weight("Y", "Z"), Some(1));
        assert_eq!(weight("Z", "Desconexao"), Some(2));
        assert_eq!(snapshot.edges.len(), 4);
    }

    #[test]
    fn test_row_metadata() {
        let snapshot = parse(&[header(), call("ABC", "Inicio|Menu_Cartao", "ABANDONO")]).unwrap();
        let journey = &snapshot.journeys[0];
        assert_eq!(journey.id, "ABC");
        assert_eq!(journey.destination, EndState::Abandono);
        assert_eq!(journey.duration_seconds, 120);
        assert_eq!(journey.product, "Cartao");
        assert_eq!(journey.hour, Some(10));
        assert_eq!(journey.weekday.as_deref(), Some("Quinta"));

        let last = snapshot.steps.last().unwrap();
        assert_eq!(last.point_code, "9001");
        assert!(snapshot.edge("Menu_Cartao", "Abandono").unwrap().point_codes.contains("9001"));
        assert!((snapshot.stats.metrics.abandonment_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_hour_and_weekday_columns() {
        let mut r = call("1", "Inicio", "Transferencia");
        r[2] = Cell::Number(1.0);
        r[3] = Cell::Number(14.0);
        let snapshot = parse(&[header(), r]).unwrap();
        assert_eq!(snapshot.journeys[0].hour, Some(14));
        assert_eq!(snapshot.journeys[0].weekday.as_deref(), Some("Segunda"));

        let mut r = call("2", "Inicio", "Transferencia");
        r[2] = Cell::from("Sabado");
        let snapshot = parse(&[header(), r]).unwrap();
        assert_eq!(snapshot.journeys[0].weekday.as_deref(), Some("Sabado"));
    }

    #[test]
    fn test_tmp_timestamp_positional() {
        let mut r = call("1", "Inicio|Menu_A", "Desconexao");
        r[11] = Cell::from("27/11/2025 10:15:00|27/11/2025 10:16:00");
        let snapshot = parse(&[header(), r]).unwrap();
        assert_eq!(
            snapshot.steps[1].timestamp,
            TimestampProcessor::parse_str("27/11/2025 10:16:00")
        );
    }

    #[test]
    fn test_empty_flow_row_skipped_not_fatal() {
        let rows = vec![
            header(),
            call("1", "", "Desconexao"),
            row(&[]),
            call("3", "Inicio|Menu_A", "Desconexao"),
            call("4", "Erro_Api|Menu_Timeout", "Desconexao"),
        ];
        let snapshot = parse(&rows).unwrap();
        assert_eq!(snapshot.journeys.len(), 1);
        assert_eq!(snapshot.report.rows_skipped(), 2);
        assert_eq!(snapshot.report.skipped_rows[0].row, 2);
        assert_eq!(snapshot.report.skipped_rows[1].row, 5);
    }

    #[test]
    fn test_out_of_range_date_serial_does_not_abort_batch() {
        let mut bad = call("1", "Inicio|Menu_A", "Desconexao");
        bad[0] = Cell::Number(1e20);
        let rows = vec![header(), bad, call("2", "Inicio|Menu_B", "Transferencia")];

        let snapshot = parse(&rows).unwrap();
        assert_eq!(snapshot.journeys.len(), 2);
        assert_eq!(snapshot.journeys[0].hour, None);
        assert_eq!(snapshot.journeys[1].hour, Some(10));
        assert!(snapshot.edge("Menu_B", "Transferencia").is_some());
    }

    #[test]
    fn test_missing_id_uses_row_number() {
        let snapshot = parse(&[header(), call("", "Inicio", "Desconexao")]).unwrap();
        assert_eq!(snapshot.journeys[0].id, "linha-2");
    }

    #[test]
    fn test_empty_spreadsheet() {
        assert!(matches!(parse(&[]), Err(FlowError::EmptySpreadsheet)));
    }

    #[test]
    fn test_all_rows_skipped_is_no_valid_steps() {
        let rows = vec![header(), call("1", "", "Desconexao")];
        assert!(matches!(parse(&rows), Err(FlowError::NoValidSteps)));
    }

    #[test]
    fn test_is_call_sheet() {
        assert!(is_call_sheet(&header()));
        assert!(!is_call_sheet(&row(&["origem", "destino", "valor"])));
    }

    // ── parse_edge_list ───────────────────────────────────────────────────────

    #[test]
    fn test_edge_list_with_header() {
        let rows = vec![
            row(&["origem", "destino", "valor"]),
            vec![Cell::from("Inicio"), Cell::from("Menu"), Cell::Number(10.0)],
            vec![Cell::from("Menu"), Cell::from("Fim"), Cell::from("x")],
            row(&["Solo"]),
        ];
        let snapshot = parse_edge_list(&rows, &AnalysisOptions::default()).unwrap();
        assert_eq!(snapshot.edge("Inicio", "Menu").map(|e| e.weight), Some(10));
        assert_eq!(snapshot.edge("Menu", "Fim").map(|e| e.weight), Some(1));
        assert_eq!(snapshot.node("Inicio").map(|n| n.kind), Some(NodeKind::Origin));
        assert_eq!(snapshot.node("Fim").map(|n| n.kind), Some(NodeKind::Destination));
        assert_eq!(snapshot.report.skipped_rows[0].row, 4);
        assert!(snapshot.journeys.is_empty());
    }

    #[test]
    fn test_edge_list_without_header() {
        let rows = vec![vec![Cell::from("A"), Cell::from("B"), Cell::Number(3.0)]];
        let snapshot = parse_edge_list(&rows, &AnalysisOptions::default()).unwrap();
        assert_eq!(snapshot.total_weight(), 3);
    }

    #[test]
    fn test_edge_list_no_usable_rows() {
        let rows = vec![row(&["origem", "destino"]), row(&["", "B"])];
        assert!(matches!(
            parse_edge_list(&rows, &AnalysisOptions::default()),
            Err(FlowError::NoValidSteps)
        ));
    }
}
