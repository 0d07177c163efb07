// Tablero
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Server-rendered HTML pages

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use tablero_core::{GuardDecision, ModuleKey, UserPermissions};

/// Seconds before the loading page asks the browser to retry
const LOADING_REFRESH_SECS: u32 = 1;

/// Escape text for inclusion in HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"es\">\n<head>\n<meta charset=\"utf-8\">\n<title>{} · Tablero</title>\n{}</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        head_extra,
        body
    )
}

/// HTML response with the given status
pub fn html_response(status: StatusCode, html: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(html)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn loading_page() -> String {
    layout(
        "Cargando",
        &format!("<meta http-equiv=\"refresh\" content=\"{}\">\n", LOADING_REFRESH_SECS),
        "<main class=\"placeholder loading\"><p>Cargando permisos…</p></main>",
    )
}

pub fn pending_approval_page() -> String {
    layout(
        "Pendiente de aprobación",
        "",
        "<main class=\"placeholder pending\"><h1>Cuenta pendiente de aprobación</h1>\
         <p>Tu cuenta todavía no tiene un rol asignado. Un administrador debe aprobarla antes de que puedas usar el tablero.</p></main>",
    )
}

pub fn access_denied_page(module: ModuleKey) -> String {
    layout(
        "Acceso denegado",
        "",
        &format!(
            "<main class=\"placeholder denied\"><h1>Acceso denegado</h1><p>No tienes permiso para acceder al módulo {}.</p><p><a href=\"/\">Volver al inicio</a></p></main>",
            escape_html(module.title())
        ),
    )
}

pub fn module_page(module: ModuleKey) -> String {
    layout(
        module.title(),
        "",
        &format!(
            "<main class=\"module\" data-module=\"{}\"><h1>{}</h1><div id=\"module-root\"></div></main>",
            module.as_str(),
            escape_html(module.title())
        ),
    )
}

/// Page for a module guard decision
pub fn guarded_page(module: ModuleKey, decision: GuardDecision) -> Response<Full<Bytes>> {
    match decision {
        GuardDecision::Loading => html_response(StatusCode::OK, loading_page()),
        GuardDecision::PendingApproval => html_response(StatusCode::OK, pending_approval_page()),
        GuardDecision::AccessDenied => html_response(StatusCode::FORBIDDEN, access_denied_page(module)),
        GuardDecision::Granted => html_response(StatusCode::OK, module_page(module)),
    }
}

pub fn admin_page() -> String {
    layout("Administración", "", "<main class=\"admin\"><h1>Administración</h1><div id=\"admin-root\"></div></main>")
}

/// Dashboard index listing the modules the user may open
pub fn index_page(email: Option<&str>, permissions: &UserPermissions, loading: bool) -> String {
    let greeting = match email {
        Some(email) => format!("<p class=\"user\">{}</p>", escape_html(email)),
        None => String::new(),
    };

    let content = if loading {
        "<p>Cargando permisos…</p>".to_string()
    } else if permissions.role.is_none() {
        "<p>Tu cuenta está pendiente de aprobación.</p>".to_string()
    } else {
        let items: String = permissions
            .accessible_modules()
            .into_iter()
            .map(|module| format!("<li><a href=\"{}\">{}</a></li>", module.path(), escape_html(module.title())))
            .collect();
        if items.is_empty() {
            "<p>No tienes módulos habilitados.</p>".to_string()
        } else {
            format!("<ul class=\"modules\">{}</ul>", items)
        }
    };

    layout(
        "Inicio",
        "",
        &format!(
            "<main class=\"index\"><h1>Tablero</h1>{}{}<form method=\"post\" action=\"/logout\"><button type=\"submit\">Cerrar sesión</button></form></main>",
            greeting, content
        ),
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let error = match error {
        Some(message) => format!("<p class=\"error\">{}</p>", escape_html(message)),
        None => String::new(),
    };

    layout(
        "Iniciar sesión",
        "",
        &format!(
            "<main class=\"login\"><h1>Iniciar sesión</h1>{}\
             <form method=\"post\" action=\"/login\">\
             <label>Correo <input type=\"email\" name=\"email\" required></label>\
             <label>Contraseña <input type=\"password\" name=\"password\" required></label>\
             <button type=\"submit\">Entrar</button></form>\
             <p><a href=\"/register\">Crear cuenta</a></p></main>",
            error
        ),
    )
}

pub fn register_page() -> String {
    layout(
        "Registro",
        "",
        "<main class=\"register\"><h1>Registro</h1><p>El acceso al tablero es por invitación. Pide a un administrador que te envíe una.</p>\
         <p><a href=\"/login\">Volver</a></p></main>",
    )
}

pub fn invite_page(token: &str) -> String {
    layout(
        "Invitación",
        "",
        &format!(
            "<main class=\"invite\" data-invite=\"{}\"><h1>Invitación</h1><p>Completa tu registro para aceptar la invitación.</p></main>",
            escape_html(token)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablero_core::{ModuleFlags, Role};

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<script>alert('x')</script>"), "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;");
        assert_eq!(escape_html("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
    }

    #[test]
    fn test_guarded_page_statuses() {
        assert_eq!(guarded_page(ModuleKey::Tareas, GuardDecision::AccessDenied).status(), StatusCode::FORBIDDEN);
        assert_eq!(guarded_page(ModuleKey::Tareas, GuardDecision::Granted).status(), StatusCode::OK);
        assert!(loading_page().contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn test_index_lists_accessible_modules() {
        let permissions = UserPermissions::new(
            Some(Role::Other("member".to_string())),
            ModuleFlags {
                mod_tareas: true,
                ..Default::default()
            },
        );
        let html = index_page(Some("ana@example.com"), &permissions, false);
        assert!(html.contains("href=\"/tareas\""));
        assert!(!html.contains("href=\"/finanzas\""));
        assert!(html.contains("ana@example.com"));

        let pending = index_page(None, &UserPermissions::default(), false);
        assert!(pending.contains("pendiente de aprobación"));
    }
}
