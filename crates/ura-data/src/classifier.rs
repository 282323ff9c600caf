//! Decides how a call ended.

use tracing::debug;
use ura_core::models::EndState;
use ura_core::taxonomy::{first_outcome, Taxonomy};

/// The evidence available for one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeSignals<'a> {
    /// Name of the last non-noise step, before loop elimination.
    pub last_step: Option<&'a str>,
    /// Indicator column / `indicador_1` field.
    pub indicator: Option<&'a str>,
    /// Free-text termination reason.
    pub termination_reason: Option<&'a str>,
}

/// Maps [`OutcomeSignals`] to an [`EndState`] using the taxonomy's rules.
///
/// Priority: last step name, then indicator, then termination reason, then
/// the taxonomy's default outcome. Matching is case-insensitive substring.
pub struct EndStateClassifier<'a> {
    taxonomy: &'a Taxonomy,
}

impl<'a> EndStateClassifier<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn classify(&self, signals: &OutcomeSignals<'_>) -> EndState {
        let checks = [
            (signals.last_step, &self.taxonomy.step_outcomes, "last step"),
            (signals.indicator, &self.taxonomy.indicator_outcomes, "indicator"),
            (
                signals.termination_reason,
                &self.taxonomy.reason_outcomes,
                "termination reason",
            ),
        ];

        for (text, rules, source) in checks {
            let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            if let Some(state) = first_outcome(rules, text) {
                debug!("End state {} from {} \"{}\"", state, source, text);
                return state;
            }
        }
        self.taxonomy.default_outcome
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(last: Option<&str>, indicator: Option<&str>, reason: Option<&str>) -> EndState {
        let taxonomy = Taxonomy::default();
        EndStateClassifier::new(&taxonomy).classify(&OutcomeSignals {
            last_step: last,
            indicator,
            termination_reason: reason,
        })
    }

    #[test]
    fn test_last_step_transfer() {
        assert_eq!(classify(Some("Transferencia_Atendente"), None, None), EndState::Transferencia);
    }

    #[test]
    fn test_last_step_finalization_keywords() {
        assert_eq!(classify(Some("Fim_Atendimento"), None, None), EndState::Finalizacao);
        assert_eq!(classify(Some("Encerramento"), None, None), EndState::Finalizacao);
    }

    #[test]
    fn test_last_step_beats_indicator() {
        assert_eq!(
            classify(Some("Menu_Desliga"), Some("Transferencia"), None),
            EndState::Desconexao
        );
    }

    #[test]
    fn test_indicator_used_when_step_is_neutral() {
        assert_eq!(classify(Some("Menu_Principal"), Some("ABANDONO"), None), EndState::Abandono);
        assert_eq!(classify(Some("Menu_Principal"), Some("Transferido"), None), EndState::Transferencia);
    }

    #[test]
    fn test_reason_cliente_desligou() {
        assert_eq!(
            classify(Some("Menu_Principal"), None, Some("Cliente Desligou")),
            EndState::Desconexao
        );
    }

    #[test]
    fn test_default_outcome() {
        assert_eq!(classify(None, None, None), EndState::Desconexao);
        assert_eq!(classify(Some("Menu"), Some(""), Some("  ")), EndState::Desconexao);
    }

    #[test]
    fn test_custom_default_outcome() {
        let taxonomy = Taxonomy {
            default_outcome: EndState::Abandono,
            ..Taxonomy::default()
        };
        let state = EndStateClassifier::new(&taxonomy).classify(&OutcomeSignals::default());
        assert_eq!(state, EndState::Abandono);
    }
}
