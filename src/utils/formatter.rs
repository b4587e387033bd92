use crate::http::Response;
use colored::*;

pub enum ResponseFormat {
    /// 状态行 + 耗时 + 截断后的 Body
    Compact,
    /// 额外包含全部 Header 和完整 Body
    Verbose,
}

pub struct ResponseFormatter {
    format: ResponseFormat,
    color: bool,
}

impl ResponseFormatter {
    /// Compact 模式下 Body 超过此长度只显示字节数
    const COMPACT_BODY_LIMIT: usize = 400;

    pub fn new(format: ResponseFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn format(&self, response: &Response) -> String {
        let mut output = vec![self.status_line(response), self.timing_line(response)];

        if matches!(self.format, ResponseFormat::Verbose) {
            output.push(self.heading("Headers:"));
            for (key, value) in response.headers.iter() {
                let value_str = value.to_str().unwrap_or("<invalid utf-8>");
                output.push(format!("   {}: {}", key, value_str));
            }
        }

        let body = &response.body;
        if !body.is_empty() {
            match self.format {
                ResponseFormat::Compact if body.len() > Self::COMPACT_BODY_LIMIT => {
                    output.push(format!("Body: {} bytes", body.len()));
                }
                ResponseFormat::Compact => output.push(pretty_json(body)),
                ResponseFormat::Verbose => {
                    output.push(self.heading("Body:"));
                    output.push(pretty_json(body));
                }
            }
        }

        output.join("\n")
    }

    fn status_line(&self, response: &Response) -> String {
        let line = format!("HTTP {}", response.status);
        if !self.color {
            return line;
        }
        if response.is_success() {
            line.green().to_string()
        } else if response.is_client_error() {
            line.yellow().to_string()
        } else if response.status.is_server_error() {
            line.red().to_string()
        } else {
            line.bold().to_string()
        }
    }

    fn timing_line(&self, response: &Response) -> String {
        let line = format!("Time: {}ms", response.duration.as_millis());
        if self.color {
            line.cyan().to_string()
        } else {
            line
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.blue().bold().to_string()
        } else {
            text.to_string()
        }
    }
}

/// 尝试将 body 格式化为漂亮的 JSON，不是 JSON 时原样返回
fn pretty_json(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| body.to_string())
}
