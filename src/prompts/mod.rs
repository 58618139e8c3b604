//! Prompt construction for the fixed set of assistant request kinds.
//!
//! Each recognized kind pairs a fixed French system instruction with a
//! user message embedding the payload sub-fields as labelled JSON blocks.
//! Pure transformation: no network or I/O side effects.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ChatMessage;
use crate::error::ProxyError;

const QUESTION_SYSTEM: &str = "Tu es un assistant médical destiné à des médecins généralistes. \
Réponds de manière précise, rigoureuse et concise aux questions médicales qui te sont posées.";

const CONSULTATION_SYNTHESIS_SYSTEM: &str = "Tu es un assistant médical. Rédige une synthèse \
claire et structurée de la consultation à partir des données fournies, en français.";

const GENERAL_SYNTHESIS_SYSTEM: &str = "Tu es un assistant médical. Rédige une synthèse globale \
du dossier du patient à partir de son historique de consultations, en français.";

const EXAM_SUGGESTIONS_SYSTEM: &str = "Tu es un assistant médical. Propose des examens \
complémentaires pertinents à partir des données du patient et du formulaire de consultation \
en cours, en français.";

/// A recognized request kind together with its typed payload.
///
/// The payload sub-objects stay opaque JSON values: only their presence is
/// validated, malformed contents surface as odd text inside the generated
/// prompt rather than as a structural error.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RequestKind {
    Question {
        question: String,
    },
    ConsultationSynthesis {
        patient: Value,
        consultation: Value,
    },
    GeneralSynthesis {
        patient: Value,
        consultations: Value,
    },
    ExamSuggestions {
        patient: Value,
        form: Value,
    },
}

impl RequestKind {
    /// Parse a kind tag and payload into a typed request.
    ///
    /// An unrecognized tag fails with the offending value before anything
    /// else happens, so no upstream call can be attempted for it.
    pub fn parse(tag: &str, payload: Value) -> Result<Self, ProxyError> {
        match tag {
            "question" | "consultation_synthesis" | "general_synthesis" | "exam_suggestions" => {
                serde_json::from_value(json!({ "type": tag, "payload": payload })).map_err(|e| {
                    ProxyError::InvalidRequest(format!("invalid payload for `{tag}`: {e}"))
                })
            }
            other => Err(ProxyError::UnknownRequestKind(other.to_string())),
        }
    }

    /// Tag name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Question { .. } => "question",
            RequestKind::ConsultationSynthesis { .. } => "consultation_synthesis",
            RequestKind::GeneralSynthesis { .. } => "general_synthesis",
            RequestKind::ExamSuggestions { .. } => "exam_suggestions",
        }
    }
}

/// Build the two-message prompt for a request: one system instruction,
/// then one user message carrying the serialized payload.
pub fn build_messages(kind: &RequestKind) -> [ChatMessage; 2] {
    match kind {
        RequestKind::Question { question } => [
            ChatMessage::system(QUESTION_SYSTEM),
            ChatMessage::user(format!("Question du médecin :\n{question}")),
        ],
        RequestKind::ConsultationSynthesis {
            patient,
            consultation,
        } => [
            ChatMessage::system(CONSULTATION_SYNTHESIS_SYSTEM),
            ChatMessage::user(format!(
                "Données du patient :\n{}\n\nDonnées de la consultation :\n{}",
                pretty(patient),
                pretty(consultation)
            )),
        ],
        RequestKind::GeneralSynthesis {
            patient,
            consultations,
        } => [
            ChatMessage::system(GENERAL_SYNTHESIS_SYSTEM),
            ChatMessage::user(format!(
                "Données du patient :\n{}\n\nHistorique des consultations :\n{}",
                pretty(patient),
                pretty(consultations)
            )),
        ],
        RequestKind::ExamSuggestions { patient, form } => [
            ChatMessage::system(EXAM_SUGGESTIONS_SYSTEM),
            ChatMessage::user(format!(
                "Données du patient :\n{}\n\nDonnées du formulaire en cours :\n{}",
                pretty(patient),
                pretty(form)
            )),
        ],
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
