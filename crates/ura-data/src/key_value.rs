//! Parser for single-session key-value files (`ContactHistory.txt` exports).
//!
//! Every line holds one or more `key<TAB>value` pairs. Navigation is spread
//! over numbered groups `fluxo_N` / `ponto_N` / `timestamp_N` /
//! `validacao_N` (N = 1..=10), each a `|`-joined list.

use std::collections::HashMap;

use tracing::{debug, warn};
use ura_core::data_processors::{clean_ani, extract_service_type, split_pipe_values, TimestampProcessor};
use ura_core::error::{FlowError, Result};
use ura_core::models::{ContactDetails, GraphSnapshot, InputFormat, UNKNOWN_PRODUCT};

use crate::aggregator::{hour_and_weekday, span_seconds};
use crate::loops::LoopStrategy;
use crate::normalizer::{RawStep, StepNormalizer};
use crate::pipeline::{AnalysisOptions, CallRecord, SnapshotAssembler};

/// Highest numbered group read from a session.
pub const MAX_GROUPS: usize = 10;

mod fields {
    pub const SESSION_ID: &str = "cod_identificacao_ligacao";
    pub const FALLBACK_ID: &str = "ID";
    pub const ROUTING_TAG: &str = "tag_roteamento_1";
    pub const START_TIME: &str = "data_hora_inicio_ligacao";
    pub const DURATION: &str = "qtd_duracao_em_segundos";
    pub const INDICATOR: &str = "indicador_1";
    pub const TERMINATION_REASON: &str = "Motivo de Finalização do Contato.";
    pub const URA_NAME: &str = "nome_ura";
}

const NOT_SPECIFIED: &str = "Não especificado";

// ── KeyValueRecord ────────────────────────────────────────────────────────────

/// Flat field map of one session file.
#[derive(Debug, Clone, Default)]
pub struct KeyValueRecord {
    fields: HashMap<String, String>,
}

impl KeyValueRecord {
    pub fn parse(text: &str) -> Self {
        let mut fields = HashMap::new();
        for line in text.lines() {
            let parts: Vec<&str> = line.trim().split('\t').collect();
            for pair in parts.chunks_exact(2) {
                let key = pair[0].trim();
                if !key.is_empty() {
                    fields.insert(key.to_string(), pair[1].trim().to_string());
                }
            }
        }
        Self { fields }
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// First non-empty value among `keys`.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Concatenated token lists of all numbered groups present.
    pub fn groups(&self) -> StepGroups {
        let mut groups = StepGroups::default();
        for n in 1..=MAX_GROUPS {
            let Some(flow) = self.get(&format!("fluxo_{n}")) else {
                continue;
            };
            let column = |prefix: &str| split_pipe_values(self.get(&format!("{prefix}_{n}")).unwrap_or(""));
            groups.flows.extend(split_pipe_values(flow));
            groups.points.extend(column("ponto"));
            groups.timestamps.extend(column("timestamp"));
            groups.events.extend(column("validacao"));
        }
        groups
    }

    /// Call metadata shown next to the graph.
    pub fn contact_details(&self) -> ContactDetails {
        ContactDetails {
            ura_name: self.described(&[fields::URA_NAME]),
            skill: self.described(&["Competência", "competencia"]),
            master_id: self.described(&["ID Mestre", fields::FALLBACK_ID]),
            dnis: self.described(&["DNIS"]),
            ani: self
                .get("ANI")
                .map(clean_ani)
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            phone_type: self.described(&["Tipo de Telefone"]),
            media_type: self.described(&["Tipo de Mídia", "Média"]),
        }
    }

    fn described(&self, keys: &[&str]) -> String {
        self.first_of(keys).unwrap_or(NOT_SPECIFIED).to_string()
    }
}

/// Parallel token lists gathered from the numbered groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepGroups {
    pub flows: Vec<String>,
    pub points: Vec<String>,
    pub timestamps: Vec<String>,
    pub events: Vec<String>,
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse one key-value session into a snapshot.
///
/// Steps are cleaned with first-seen deduplication. Fails with
/// [`FlowError::MissingRequiredFields`] when neither `fluxo_1` nor `ponto_1`
/// is present and with [`FlowError::NoValidSteps`] when nothing survives the
/// noise filter.
pub fn parse_key_value_session(text: &str, options: &AnalysisOptions) -> Result<GraphSnapshot> {
    let record = KeyValueRecord::parse(text);
    if record.get("fluxo_1").is_none() && record.get("ponto_1").is_none() {
        return Err(FlowError::MissingRequiredFields("fluxo_1, ponto_1".to_string()));
    }

    let session_id = record
        .first_of(&[fields::SESSION_ID, fields::FALLBACK_ID])
        .unwrap_or("UNKNOWN")
        .to_string();
    let service_type = record.get(fields::ROUTING_TAG).and_then(extract_service_type);
    let start_text = record.get(fields::START_TIME).unwrap_or("");
    let session_start = TimestampProcessor::parse_str(start_text);

    let groups = record.groups();
    debug!(
        "Session {}: {} fields, {} flow tokens",
        session_id,
        record.len(),
        groups.flows.len()
    );

    let normalizer = StepNormalizer::new(&options.taxonomy);
    let steps = normalizer.normalize(groups.flows.iter().enumerate().map(|(i, name)| {
        let timestamp = groups
            .timestamps
            .get(i)
            .and_then(|t| TimestampProcessor::parse_str(t))
            .or(session_start);
        RawStep {
            session_id: session_id.clone(),
            timestamp,
            menu_name: name.clone(),
            event_name: groups.events.get(i).cloned(),
            point_code: groups.points.get(i).cloned().unwrap_or_default(),
            service_type: service_type.clone(),
        }
    }));

    if !steps.has_valid() {
        warn!("Session {} has no valid navigation steps", session_id);
        return Err(FlowError::NoValidSteps);
    }

    let started_at = session_start.or_else(|| steps.valid.iter().find_map(|s| s.timestamp));
    let (hour, weekday) = match started_at.as_ref().map(hour_and_weekday) {
        Some((hour, weekday)) => (Some(hour), Some(weekday)),
        None => (None, None),
    };
    let duration_seconds = record
        .get(fields::DURATION)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d as u64)
        .unwrap_or_else(|| span_seconds(&steps.valid));
    let product = service_type
        .clone()
        .or_else(|| record.get(fields::URA_NAME).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

    let mut assembler = SnapshotAssembler::new(InputFormat::KeyValue, LoopStrategy::FirstSeen, options);
    assembler.extend_steps(steps.all);
    assembler.add_call(
        CallRecord {
            id: session_id,
            indicator: record.get(fields::INDICATOR),
            termination_reason: record.get(fields::TERMINATION_REASON),
            duration_seconds,
            hour,
            weekday,
            product,
        },
        steps.valid,
    );
    assembler.set_contact(record.contact_details());
    Ok(assembler.finish())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ura_core::models::{EndState, NodeKind};

    const CONTACT_HISTORY: &str = "Detalhes do Contato
ID\t688670357120\tID Mestre\t688670357121
Competência\tURA_RE\tnome_ura\tURA_SEGUROS
ANI\t+5511996261856 (Land Line)\tDNIS\t+551130030000
Tipo de Telefone\tFixo\tMédia\tTelefone
cod_identificacao_ligacao\tCALL-42
data_hora_inicio_ligacao\t27/11/2025 20:26:42
qtd_duracao_em_segundos\t95
tag_roteamento_1\tTipo_Servico:JORNADA_RE_GERAL|Workflow:JORNADA_RE
fluxo_1\tInicio|Identificacao|Menu_Silencio|Menu_Sinistro
ponto_1\t100|200|300|400
timestamp_1\t27/11/2025 20:26:42|27/11/2025 20:26:50||27/11/2025 20:27:30
validacao_1\tOK|OK|ERRO|OK
fluxo_2\tTransferencia_Atendente
ponto_2\t500
indicador_1\tTransferido";

    fn parse(text: &str) -> Result<GraphSnapshot> {
        parse_key_value_session(text, &AnalysisOptions::default())
    }

    // ── KeyValueRecord ────────────────────────────────────────────────────────

    #[test]
    fn test_record_parses_multiple_pairs_per_line() {
        let record = KeyValueRecord::parse("ID\t1\tID Mestre\t2\n\tDNIS\t3\nsolo");
        assert_eq!(record.get("ID"), Some("1"));
        assert_eq!(record.get("ID Mestre"), Some("2"));
        assert_eq!(record.get("DNIS"), Some("3"));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_record_empty_value_is_absent() {
        let record = KeyValueRecord::parse("fluxo_1\t\nponto_1\t10");
        assert_eq!(record.get("fluxo_1"), None);
        assert_eq!(record.get("ponto_1"), Some("10"));
    }

    #[test]
    fn test_groups_concatenate_in_order() {
        let record = KeyValueRecord::parse("fluxo_1\tA|B\nponto_1\t1|2\nfluxo_3\tC\nponto_3\t3");
        let groups = record.groups();
        assert_eq!(groups.flows, vec!["A", "B", "C"]);
        assert_eq!(groups.points, vec!["1", "2", "3"]);
        assert!(groups.timestamps.is_empty());
    }

    #[test]
    fn test_contact_details_defaults() {
        let details = KeyValueRecord::parse("fluxo_1\tA").contact_details();
        assert_eq!(details.ura_name, NOT_SPECIFIED);
        assert_eq!(details.ani, NOT_SPECIFIED);
    }

    // ── parse_key_value_session ───────────────────────────────────────────────

    #[test]
    fn test_first_seen_dedup_and_trailing_edge() {
        let snapshot = parse("fluxo_1\tMenu_A|Menu_B|Menu_A\nindicador_1\tTransferencia").unwrap();

        assert_eq!(snapshot.journeys[0].ordered_step_names, vec!["Menu_A", "Menu_B"]);
        assert_eq!(snapshot.edges.len(), 2);
        assert_eq!(snapshot.edge("Menu_A", "Menu_B").map(|e| e.weight), Some(1));
        assert_eq!(snapshot.edge("Menu_B", "Transferencia").map(|e| e.weight), Some(1));
        assert_eq!(snapshot.node("Menu_A").map(|n| n.kind), Some(NodeKind::Origin));
        assert_eq!(
            snapshot.node("Transferencia").map(|n| n.kind),
            Some(NodeKind::Destination)
        );
    }

    #[test]
    fn test_full_contact_history() {
        let snapshot = parse(CONTACT_HISTORY).unwrap();
        let journey = &snapshot.journeys[0];

        assert_eq!(journey.id, "CALL-42");
        assert_eq!(
            journey.ordered_step_names,
            vec!["Inicio", "Identificacao", "Menu_Sinistro", "Transferencia_Atendente"]
        );
        assert_eq!(journey.destination, EndState::Transferencia);
        assert_eq!(journey.duration_seconds, 95);
        assert_eq!(journey.hour, Some(20));
        assert_eq!(journey.weekday.as_deref(), Some("Quinta"));
        assert_eq!(journey.product, "JORNADA_RE_GERAL");

        // Noise stays in the step list but not in the graph.
        assert_eq!(snapshot.steps.len(), 5);
        assert!(snapshot.steps[2].is_noise);
        assert!(snapshot.node("Menu_Silencio").is_none());

        let sinistro = &snapshot.steps[3];
        assert_eq!(sinistro.point_code, "400");
        assert_eq!(sinistro.event_name.as_deref(), Some("OK"));
        assert_eq!(sinistro.service_type.as_deref(), Some("JORNADA_RE_GERAL"));

        let edge = snapshot.edge("Identificacao", "Menu_Sinistro").unwrap();
        assert!(edge.point_codes.contains("200"));
        assert!(edge.point_codes.contains("400"));

        let contact = snapshot.contact.as_ref().unwrap();
        assert_eq!(contact.ura_name, "URA_SEGUROS");
        assert_eq!(contact.skill, "URA_RE");
        assert_eq!(contact.master_id, "688670357121");
        assert_eq!(contact.ani, "+5511996261856");
        assert_eq!(contact.media_type, "Telefone");
    }

    #[test]
    fn test_positional_timestamps_fall_back_to_start() {
        // The empty middle timestamp is dropped, shifting later ones left.
        let snapshot = parse(CONTACT_HISTORY).unwrap();
        let last = snapshot.steps.last().unwrap();
        assert_eq!(last.timestamp, TimestampProcessor::parse_str("27/11/2025 20:26:42"));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = parse("cod_identificacao_ligacao\t1\nindicador_1\tTransferido").unwrap_err();
        assert!(matches!(err, FlowError::MissingRequiredFields(_)));
    }

    #[test]
    fn test_only_point_group_has_no_valid_steps() {
        let err = parse("ponto_1\t100|200").unwrap_err();
        assert!(matches!(err, FlowError::NoValidSteps));
    }

    #[test]
    fn test_all_noise_is_no_valid_steps() {
        let err = parse("fluxo_1\tErro_Api|Menu_Timeout|Else").unwrap_err();
        assert!(matches!(err, FlowError::NoValidSteps));
    }

    #[test]
    fn test_single_valid_step_is_enough() {
        let snapshot = parse("fluxo_1\tErro_Api|Inicio").unwrap();
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].target, "Desconexao");
    }

    #[test]
    fn test_unknown_session_id_and_product() {
        let snapshot = parse("fluxo_1\tInicio").unwrap();
        assert_eq!(snapshot.journeys[0].id, "UNKNOWN");
        assert_eq!(snapshot.journeys[0].product, UNKNOWN_PRODUCT);
        assert_eq!(snapshot.journeys[0].hour, None);
    }

    #[test]
    fn test_termination_reason_classifies() {
        let text = "fluxo_1\tInicio|Menu_Principal\nMotivo de Finalização do Contato.\tCliente Desligou";
        let snapshot = parse(text).unwrap();
        assert_eq!(snapshot.journeys[0].destination, EndState::Desconexao);
        assert_eq!(snapshot.stats.temporal.outcome_count(EndState::Desconexao), 1);
    }

    #[test]
    fn test_duration_from_step_span() {
        let text = "fluxo_1\tA|B\ntimestamp_1\t27/11/2025 10:00:00|27/11/2025 10:01:30";
        let snapshot = parse(text).unwrap();
        assert_eq!(snapshot.journeys[0].duration_seconds, 90);
    }
}
