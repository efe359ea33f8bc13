//! Command parsing / 命令解析

use crate::error::BotError;
use crate::search::{Field, SearchQuery};

pub const USAGE_APELLIDO: &str = "⚠️ Uso: /apellido [Apellido]";
pub const USAGE_NOMBRE: &str = "⚠️ Uso: /nombre [Nombre]";
pub const USAGE_DOMICILIO: &str = "⚠️ Uso: /domicilio [Domicilio]";
pub const USAGE_FINDER: &str = "⚠️ Uso: /finder [Sexo] [Clase] [Domicilio]";
pub const USAGE_PERSONA: &str = "⚠️ Uso: /persona [Apellido] [Nombre]";

pub const HELP_TEXT: &str = "Hola 👋. Envíame el código/DNI para buscar en la base de datos.\n\n\
Comandos:\n\
/apellido [Apellido] - buscar por apellido\n\
/nombre [Nombre] - buscar por nombre\n\
/domicilio [Domicilio] - buscar por domicilio\n\
/finder [Sexo] [Clase] [Domicilio] - búsqueda combinada\n\
/persona [Apellido] [Nombre] - buscar una persona\n\
/actualizar - volver a descargar la base de datos\n\
/ayuda - mostrar esta ayuda";

pub const UNKNOWN_HINT: &str = "🤔 Comando desconocido. Usa /ayuda para ver los comandos disponibles.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// /start, /ayuda
    Help,
    /// /actualizar
    Refresh,
    Search(SearchQuery),
    /// Slash command we do not know / 未知命令
    Unknown(String),
}

impl Command {
    /// Parse a text message / 解析文本消息
    ///
    /// Plain text (no leading `/`) is an identifier search. `/cmd@BotName` is
    /// accepted for group chats.
    pub fn parse(text: &str) -> Result<Command, BotError> {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return SearchQuery::single(Field::Id, text)
                .map(Command::Search)
                .ok_or_else(|| BotError::MalformedCommand(HELP_TEXT.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();

        match name.as_str() {
            "start" | "ayuda" | "help" => Ok(Command::Help),
            "actualizar" => Ok(Command::Refresh),
            "apellido" => single(Field::Surname, &args, USAGE_APELLIDO),
            "nombre" => single(Field::GivenName, &args, USAGE_NOMBRE),
            "domicilio" => single(Field::Address, &args, USAGE_DOMICILIO),
            "finder" => {
                if args.len() < 3 {
                    return Err(malformed(USAGE_FINDER));
                }
                SearchQuery::combined(args[0], args[1], &args[2..].join(" "))
                    .map(Command::Search)
                    .ok_or_else(|| malformed(USAGE_FINDER))
            }
            "persona" => {
                if args.len() < 2 {
                    return Err(malformed(USAGE_PERSONA));
                }
                SearchQuery::person(args[0], &args[1..].join(" "))
                    .map(Command::Search)
                    .ok_or_else(|| malformed(USAGE_PERSONA))
            }
            _ => Ok(Command::Unknown(name)),
        }
    }
}

fn malformed(usage: &str) -> BotError {
    BotError::MalformedCommand(usage.to_string())
}

fn single(field: Field, args: &[&str], usage: &str) -> Result<Command, BotError> {
    SearchQuery::single(field, &args.join(" "))
        .map(Command::Search)
        .ok_or_else(|| malformed(usage))
}
