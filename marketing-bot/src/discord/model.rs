//! The subset of Discord's interaction payloads the bot speaks.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use serde_repr::Deserialize_repr;

/// Message flag hiding a reply from everyone but the invoking user.
pub(crate) const EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr)]
#[repr(u8)]
pub(crate) enum InteractionType {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    ApplicationCommandAutocomplete = 4,
    ModalSubmit = 5,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) discriminator: Option<String>,
    #[serde(default)]
    pub(crate) global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Member {
    #[serde(default)]
    pub(crate) user: Option<User>,
    #[serde(default)]
    pub(crate) nick: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommandOption {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModalField {
    pub(crate) custom_id: String,
    #[serde(default)]
    pub(crate) value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ActionRow {
    #[serde(default)]
    pub(crate) components: Vec<ModalField>,
}

/// Union of the command and modal-submit data shapes.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InteractionData {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) options: Vec<CommandOption>,
    #[serde(default)]
    pub(crate) custom_id: Option<String>,
    #[serde(default)]
    pub(crate) components: Vec<ActionRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Interaction {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) kind: InteractionType,
    #[serde(default)]
    pub(crate) data: InteractionData,
    #[serde(default)]
    pub(crate) member: Option<Member>,
    /// Set instead of `member` when invoked in a DM.
    #[serde(default)]
    pub(crate) user: Option<User>,
    pub(crate) token: String,
}

/// Identity of whoever triggered a flow, as forwarded to the automations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Requester {
    pub(crate) username: String,
    pub(crate) display_name: String,
    pub(crate) id: String,
    pub(crate) tag: String,
}

impl Interaction {
    pub(crate) fn command_name(&self) -> &str {
        self.data.name.as_deref().unwrap_or_default()
    }

    pub(crate) fn modal_id(&self) -> &str {
        self.data.custom_id.as_deref().unwrap_or_default()
    }

    fn option(&self, name: &str) -> Option<&Value> {
        self.data
            .options
            .iter()
            .find(|option| option.name == name)
            .and_then(|option| option.value.as_ref())
    }

    pub(crate) fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(Value::as_str)
    }

    pub(crate) fn option_i64(&self, name: &str) -> Option<i64> {
        self.option(name).and_then(Value::as_i64)
    }

    /// Value typed into the modal text input `custom_id`.
    pub(crate) fn field(&self, custom_id: &str) -> Option<&str> {
        self.data
            .components
            .iter()
            .flat_map(|row| &row.components)
            .find(|field| field.custom_id == custom_id)
            .map(|field| field.value.as_str())
    }

    pub(crate) fn requester(&self) -> Requester {
        let member = self.member.as_ref();
        let Some(user) = member.and_then(|m| m.user.as_ref()).or(self.user.as_ref()) else {
            return Requester {
                username: "unknown".to_string(),
                display_name: "unknown".to_string(),
                id: String::new(),
                tag: "unknown".to_string(),
            };
        };
        let tag = match user.discriminator.as_deref() {
            None | Some("0" | "") => user.username.clone(),
            Some(discriminator) => format!("{}#{discriminator}", user.username),
        };
        let display_name = member
            .and_then(|m| m.nick.clone())
            .or_else(|| user.global_name.clone())
            .unwrap_or_else(|| user.username.clone());
        Requester {
            username: user.username.clone(),
            display_name,
            id: user.id.clone(),
            tag,
        }
    }
}

pub(crate) mod response {
    //! Bodies returned from the interaction endpoint.

    use super::{EPHEMERAL, Value, json};

    pub(crate) fn pong() -> Value {
        json!({ "type": 1 })
    }

    pub(crate) fn message(content: &str) -> Value {
        json!({ "type": 4, "data": { "content": content } })
    }

    pub(crate) fn ephemeral(content: &str) -> Value {
        json!({ "type": 4, "data": { "content": content, "flags": EPHEMERAL } })
    }

    /// A text input inside a modal.
    pub(crate) struct TextInput {
        pub(crate) custom_id: &'static str,
        pub(crate) label: &'static str,
        pub(crate) placeholder: &'static str,
        pub(crate) paragraph: bool,
        pub(crate) max_length: u32,
    }

    pub(crate) fn modal(custom_id: &str, title: &str, inputs: &[TextInput]) -> Value {
        let rows: Vec<Value> = inputs
            .iter()
            .map(|input| {
                json!({
                    "type": 1,
                    "components": [{
                        "type": 4,
                        "custom_id": input.custom_id,
                        "label": input.label,
                        "placeholder": input.placeholder,
                        "style": if input.paragraph { 2 } else { 1 },
                        "max_length": input.max_length,
                        "required": true,
                    }],
                })
            })
            .collect();
        json!({
            "type": 9,
            "data": { "custom_id": custom_id, "title": title, "components": rows },
        })
    }
}

/// Slash command definitions registered at startup.
pub(crate) fn command_definitions() -> Value {
    const STRING: u8 = 3;
    const INTEGER: u8 = 4;
    json!([
        { "name": "marketing", "description": "📋 Cria uma nova solicitação de tarefa de marketing", "type": 1 },
        { "name": "parceria", "description": "🤝 Registra uma nova parceria comercial", "type": 1 },
        {
            "name": "cro",
            "description": "📊 Obtém dados de desempenho das páginas do site via Microsoft Clarity",
            "type": 1,
            "options": [
                {
                    "name": "data_desejada",
                    "description": "Data inicial da consulta (DD/MM/AAAA) - padrão: hoje",
                    "type": STRING,
                    "required": false,
                },
                {
                    "name": "final_da_url_desejada",
                    "description": "Final da URL para análise (ex: credenciamento) - padrão: dados consolidados do site",
                    "type": STRING,
                    "required": false,
                },
            ],
        },
        {
            "name": "leads",
            "description": "📈 Estatísticas do funil de leads",
            "type": 1,
            "options": [
                {
                    "name": "dias",
                    "description": "Período em dias (padrão: 1)",
                    "type": INTEGER,
                    "required": false,
                    "min_value": 1,
                    "max_value": 90,
                },
                {
                    "name": "campanha",
                    "description": "Filtra por campanha",
                    "type": STRING,
                    "required": false,
                },
            ],
        },
        { "name": "midiakit", "description": "🎨 Acessa o mídia kit oficial da 4.events com logos, ícones e materiais audiovisuais", "type": 1 },
        { "name": "apresentações", "description": "📊 Acessa as apresentações comerciais oficiais da 4.events em PDF e editáveis online", "type": 1 },
        { "name": "modelos", "description": "📄 Acessa os modelos de documentos e templates com branding da 4.events", "type": 1 },
        { "name": "capa-linkedin", "description": "🖼️ Acessa a capa oficial da 4.events para LinkedIn dos colaboradores", "type": 1 },
        { "name": "fundo-escritorio", "description": "🖥️ Acessa o papel de parede oficial da 4.events para área de trabalho", "type": 1 },
        { "name": "ping", "description": "🏓 Testa a conectividade do bot", "type": 1 },
        { "name": "help", "description": "❓ Mostra informações de ajuda sobre os comandos", "type": 1 },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modal_submit() -> Interaction {
        serde_json::from_value(json!({
            "id": "1",
            "application_id": "app",
            "type": 5,
            "token": "tok",
            "member": {
                "nick": "Ana M.",
                "user": { "id": "42", "username": "ana", "discriminator": "0", "global_name": "Ana" },
            },
            "data": {
                "custom_id": "marketing_modal",
                "components": [
                    { "type": 1, "components": [{ "type": 4, "custom_id": "nome_demanda", "value": "Banner" }] },
                    { "type": 1, "components": [{ "type": 4, "custom_id": "prazo", "value": "25/12/2025" }] },
                ],
            },
        }))
        .unwrap()
    }

    #[test]
    fn reads_modal_fields() {
        let interaction = modal_submit();
        assert_eq!(interaction.kind, InteractionType::ModalSubmit);
        assert_eq!(interaction.modal_id(), "marketing_modal");
        assert_eq!(interaction.field("nome_demanda"), Some("Banner"));
        assert_eq!(interaction.field("prazo"), Some("25/12/2025"));
        assert_eq!(interaction.field("detalhes_demanda"), None);
    }

    #[test]
    fn requester_prefers_nick_and_drops_the_zero_discriminator() {
        let requester = modal_submit().requester();
        assert_eq!(
            requester,
            Requester {
                username: "ana".to_string(),
                display_name: "Ana M.".to_string(),
                id: "42".to_string(),
                tag: "ana".to_string(),
            }
        );
    }

    #[test]
    fn dm_user_with_legacy_discriminator() {
        let interaction: Interaction = serde_json::from_value(json!({
            "id": "1",
            "type": 2,
            "token": "tok",
            "user": { "id": "7", "username": "bob", "discriminator": "1234" },
            "data": { "name": "leads", "options": [{ "name": "dias", "type": 4, "value": 7 }] },
        }))
        .unwrap();

        let requester = interaction.requester();
        assert_eq!(requester.tag, "bob#1234");
        assert_eq!(requester.display_name, "bob");
        assert_eq!(interaction.command_name(), "leads");
        assert_eq!(interaction.option_i64("dias"), Some(7));
        assert_eq!(interaction.option_str("campanha"), None);
    }

    #[test]
    fn ping_payload() {
        let interaction: Interaction =
            serde_json::from_value(json!({ "id": "1", "type": 1, "token": "tok" })).unwrap();
        assert_eq!(interaction.kind, InteractionType::Ping);
        assert_eq!(response::pong(), json!({ "type": 1 }));
    }

    #[test]
    fn ephemeral_replies_carry_the_flag() {
        assert_eq!(
            response::ephemeral("nope"),
            json!({ "type": 4, "data": { "content": "nope", "flags": 64 } })
        );
    }

    #[test]
    fn modal_rows_hold_one_input_each() {
        let modal = response::modal(
            "m",
            "Title",
            &[
                response::TextInput { custom_id: "a", label: "A", placeholder: "", paragraph: false, max_length: 10 },
                response::TextInput { custom_id: "b", label: "B", placeholder: "", paragraph: true, max_length: 20 },
            ],
        );
        assert_eq!(modal["type"], 9);
        assert_eq!(modal["data"]["components"][1]["components"][0]["style"], 2);
    }

    #[test]
    fn every_command_is_defined_once() {
        let definitions = command_definitions();
        let names: Vec<&str> = definitions
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "marketing",
                "parceria",
                "cro",
                "leads",
                "midiakit",
                "apresentações",
                "modelos",
                "capa-linkedin",
                "fundo-escritorio",
                "ping",
                "help",
            ]
        );
    }
}
