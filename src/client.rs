use std::time::Duration;

/// 실행 중인 트레이 앱의 `/control`에 포트를 보내는 클라이언트 (`--send`)
pub struct ControlClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl ControlClient {
    pub fn new(url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(1500))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            client,
            url: url.to_string(),
        }
    }

    /// 상태 코드와 응답 JSON(없으면 Null)을 돌려준다
    pub fn send_port(&self, port: u64) -> Result<(u16, serde_json::Value), reqwest::Error> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "port": port }))
            .send()?;
        let status = resp.status().as_u16();
        let body = resp.json().unwrap_or(serde_json::Value::Null);
        Ok((status, body))
    }
}

/// `--send` 모드 진입점. 200이면 0, 그 외는 1.
pub fn run_send(url: &str, port: u64) -> i32 {
    match ControlClient::new(url).send_port(port) {
        Ok((200, _)) => {
            println!("✅ port {} → {}", port, url);
            0
        }
        Ok((status, body)) => {
            eprintln!("❌ {} {}", status, body);
            1
        }
        Err(e) => {
            log::warn!("POST 실패 ({}): {}", port, e);
            eprintln!("❌ {} 에 연결할 수 없음: {}", url, e);
            1
        }
    }
}
