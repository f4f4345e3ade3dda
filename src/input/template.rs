use super::InputError;

/// Values available to boot command templates as `{{ .HTTPIP }}`,
/// `{{ .HTTPPort }}` and `{{ .Name }}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootCommandData {
    pub http_ip: String,
    pub http_port: u16,
    pub name: String,
}

impl BootCommandData {
    pub fn new(http_ip: impl Into<String>, http_port: u16, name: impl Into<String>) -> Self {
        Self {
            http_ip: http_ip.into(),
            http_port,
            name: name.into(),
        }
    }

    fn field(&self, token: &str) -> Result<String, InputError> {
        let Some(field) = token.strip_prefix('.') else {
            return Err(InputError::Template {
                reason: format!("placeholder `{token}` must start with `.`"),
            });
        };
        match field {
            "HTTPIP" => Ok(self.http_ip.clone()),
            "HTTPPort" => Ok(self.http_port.to_string()),
            "Name" => Ok(self.name.clone()),
            other => Err(InputError::Template {
                reason: format!("unknown field `{other}`; expected HTTPIP, HTTPPort or Name"),
            }),
        }
    }
}

pub fn render_boot_command(template: &str, data: &BootCommandData) -> Result<String, InputError> {
    render_template_with_placeholders(template, |token| data.field(token))
}

fn render_template_with_placeholders<F>(template: &str, mut resolve: F) -> Result<String, InputError>
where
    F: FnMut(&str) -> Result<String, InputError>,
{
    let mut rendered = String::new();
    let mut cursor = template;

    while let Some(start) = cursor.find("{{") {
        rendered.push_str(&cursor[..start]);
        let after_open = &cursor[start + 2..];
        let Some(close_offset) = after_open.find("}}") else {
            return Err(InputError::Template {
                reason: "unclosed placeholder".to_string(),
            });
        };
        let token = after_open[..close_offset].trim();
        if token.is_empty() {
            return Err(InputError::Template {
                reason: "empty placeholder".to_string(),
            });
        }
        rendered.push_str(&resolve(token)?);
        cursor = &after_open[close_offset + 2..];
    }

    if cursor.contains("}}") {
        return Err(InputError::Template {
            reason: "unexpected `}}` outside a placeholder".to_string(),
        });
    }
    rendered.push_str(cursor);
    Ok(rendered)
}
