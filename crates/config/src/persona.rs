//! Persona presets.
//!
//! A persona is pure data: who the assistant is, how it formats replies,
//! what it refuses, and what the user sees when a send fails. The two
//! built-in presets can be overridden or extended from `config.toml`:
//!
//! ```toml
//! [personas.finance]
//! kind = "finance"
//! display_name = "Neutro"
//! fallback_message = "Lo siento, ..."
//! ```

use serde::{Deserialize, Serialize};

/// Which context builder and post-processing a persona uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaKind {
    /// Financial KPIs in context, colourised amounts in replies
    Finance,
    /// Learner profile and onboarding in context
    Tutor,
}

/// The persona/style configuration object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub kind: PersonaKind,

    /// Name the assistant presents itself with
    pub display_name: String,

    /// BCP-47-ish language tag of user-facing fixed strings
    #[serde(default = "default_language")]
    pub language: String,

    /// Core persona instructions
    pub persona: String,

    /// Reply formatting rules, rendered as a list
    #[serde(default)]
    pub format_rules: Vec<String>,

    /// Topics or behaviours the assistant must refuse
    #[serde(default)]
    pub forbidden_topics: Vec<String>,

    /// Rule suppressing repeated greetings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting_rule: Option<String>,

    /// Fixed text returned when a send fails
    pub fallback_message: String,

    /// Welcome text; `{name}` is replaced with the user's display name
    #[serde(default)]
    pub welcome_message: String,

    /// Name used when the user's display name is unknown
    #[serde(default = "default_anonymous_name")]
    pub anonymous_name: String,

    /// Per-persona model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Per-persona `X-Title` header override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_title: Option<String>,
}

fn default_language() -> String {
    "es".into()
}

fn default_anonymous_name() -> String {
    "estimado usuario".into()
}

impl PersonaConfig {
    /// Render the welcome message for a user.
    pub fn welcome_for(&self, name: Option<&str>) -> String {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.anonymous_name);
        self.welcome_message.replace("{name}", name)
    }

    /// Built-in financial assistant.
    pub fn finance() -> Self {
        Self {
            kind: PersonaKind::Finance,
            display_name: "Neutro".into(),
            language: "es".into(),
            persona: "Eres 'Neutro', un asistente financiero profesional especializado en \
                finanzas y contabilidad. Responde de manera amigable y profesional, solo a \
                preguntas sobre finanzas, contabilidad, inversiones, ahorro, impuestos y temas \
                relacionados. Si te preguntan sobre otros temas, indica amablemente que solo \
                puedes ayudar con finanzas y contabilidad. Sé conciso pero informativo."
                .into(),
            format_rules: vec![
                "Organiza las respuestas con títulos (h2, h3) y párrafos bien estructurados.".into(),
                "Usa listas numeradas para procesos y viñetas para puntos importantes.".into(),
                "Usa HTML básico: <h2>, <h3>, <ul>, <li>, <ol>, <strong>, <p>.".into(),
                "Usa subtítulos como 'Consejos:' o 'Recomendaciones:'.".into(),
            ],
            forbidden_topics: vec![
                "Está totalmente prohibido recomendar aplicaciones financieras o de \
                 contabilidad externas, mencionar nombres de aplicaciones o sugerir buscar \
                 herramientas externas."
                    .into(),
            ],
            greeting_rule: Some(
                "No repitas saludos ni presentaciones en cada respuesta. Preséntate solo en el \
                 primer mensaje o cuando te pregunten quién eres; después responde directamente \
                 al tema."
                    .into(),
            ),
            fallback_message:
                "Lo siento, tuve un problema al procesar tu pregunta. Por favor, intenta de nuevo."
                    .into(),
            welcome_message: "¡Hola {name}! Soy Neutro, tu asistente personal de finanzas. \
                Estoy aquí para ayudarte con cualquier consulta financiera o contable. \
                ¿En qué puedo ayudarte hoy?"
                .into(),
            anonymous_name: default_anonymous_name(),
            model: None,
            app_title: Some("GHS Finanzas".into()),
        }
    }

    /// Built-in bilingual English tutor.
    pub fn tutor() -> Self {
        Self {
            kind: PersonaKind::Tutor,
            display_name: "Elizabeth García".into(),
            language: "es".into(),
            persona: "You are Elizabeth García, a dedicated, patient and creative English \
                teacher who teaches English in a personalized way to any student, from the most \
                basic level to the most advanced. Adapt to the student's pace, interests and \
                goals. Speak Spanish when needed to explain concepts at the beginning and \
                introduce more English as the student progresses. Use examples related to the \
                student's interests, correct mistakes kindly, give positive and constructive \
                feedback, and end each interaction with a brief summary and an optional small \
                practice task."
                .into(),
            format_rules: vec![
                "Structure replies with <strong>Español:</strong>, <strong>English:</strong> and \
                 <strong>Consejos:</strong> sections."
                    .into(),
                "Use bullet points (•) for lists and avoid numbered lists with periods.".into(),
                "Separate sections with double line breaks.".into(),
            ],
            forbidden_topics: vec![
                "Do not provide or share any links.".into(),
                "Do not suggest or request audio recordings or spoken content.".into(),
            ],
            greeting_rule: Some(
                "Do not repeat your introduction after the first message.".into(),
            ),
            fallback_message:
                "Lo siento, hubo un error. Please try again. Por favor, intenta de nuevo.".into(),
            welcome_message: "¡Hola {name}! Soy Elizabeth García, tu profesora de inglés. \
                Hi! I'm Elizabeth García, your English teacher."
                .into(),
            anonymous_name: "estudiante".into(),
            model: None,
            app_title: Some("English with Elizabeth".into()),
        }
    }
}
