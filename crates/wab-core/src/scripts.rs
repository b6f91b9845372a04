//! Canned conversation texts (WhatsApp markup: `*bold*`).

use crate::config::DEFAULT_ENROLLMENT_FORM_URL;

pub const WELCOME_CAPTION: &str = "🙋‍♀️ *¡Bienvenidas a las inscripciones del Programa de Formación de Lecturistas para mujeres!* ✨\n\
*Dirigido a mujeres que buscan empoderarse a través del conocimiento.*\n\
¡Gracias por ponerte en contacto! En breve te responderemos.";

pub const INELIGIBLE_TEXT: &str = "🙏 *Gracias por confirmar.*\n\
El perfil que buscamos debe cumplir con todos los requisitos. Gracias por comunicarse con nosotros.";

pub const NUMERIC_OPTION_NOTICE: &str = "⚠️ *Responde con el número de la opción:*\n1 = Sí  |  2 = No";

const MENU_LINES: &[&str] = &[
    "*¿Quiénes pueden inscribirse a este programa gratuito de Formación de Lecturistas?*",
    "",
    "• 👩 *Mujeres*",
    "• 📍 *Residir en Lima o Callao*",
    "• 📆 *18 a 45 años*",
    "• 🎓 *Secundaria completa*",
    "• 📋 *No tener antecedentes penales ni policiales*",
    "• ⏳ *Disponibilidad para asistir a las clases presenciales en Tecsup-Lima*",
    "",
    "*Confirma si cumples con los requisitos*",
    "*Responde 1 (Sí) o 2 (No)*",
    "1. ✅ Sí, cumplo con los requisitos.",
    "2. ❌ No.",
];

/// The fixed requirements menu.
pub fn requirements_menu() -> String {
    MENU_LINES.join("\n")
}

/// Outcome for "1", pointing to the enrollment form.
pub fn eligible_text(form_url: &str) -> String {
    let url = if form_url.trim().is_empty() {
        DEFAULT_ENROLLMENT_FORM_URL
    } else {
        form_url.trim()
    };
    format!(
        "🎉 *¡Excelente!* Cumples los requisitos.\n\
         📝 Haz clic en el siguiente enlace y completa el formulario. Por favor, recuerda llenar tus datos correctamente:\n\
         {url}"
    )
}
