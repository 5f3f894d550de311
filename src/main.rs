mod browser;
mod client;
mod config;
mod controller;
mod error;
mod lifecycle;
mod menu;
mod page;
mod profiles;
mod reconcile;
mod server;
mod tray;
mod watcher;
mod window;

use config::Config;
use tray::{log_to_file, run_tray_app};

/// CLI로 고른 실행 방식
#[derive(Debug, PartialEq)]
enum Mode {
    Run,
    Send(u64),
    Watch,
    Assign { exe: String, port: u64 },
    Unassign(String),
    Help,
}

/// 인자를 읽어 설정에 덮어쓴다. 설정 파일은 건드리지 않는다.
fn parse_args(args: &[String], config: &mut Config) -> Result<Mode, String> {
    let mut mode = Mode::Run;
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Mode::Help),
            "--headless" => config.headless = true,
            "--url" | "-u" => {
                let url = iter.next().ok_or("--url 값이 필요합니다")?;
                url::Url::parse(url).map_err(|e| format!("잘못된 URL {}: {}", url, e))?;
                config.app_url = url.clone();
            }
            "--port" => {
                let port = iter.next().ok_or("--port 값이 필요합니다")?;
                config.control_port = port
                    .parse()
                    .map_err(|_| format!("잘못된 포트: {}", port))?;
            }
            "--send" | "-s" => {
                let port = iter.next().ok_or("--send 값이 필요합니다 (1..5)")?;
                let port = port
                    .parse()
                    .map_err(|_| format!("잘못된 프로필 번호: {}", port))?;
                mode = Mode::Send(port);
            }
            "--watch" | "-w" => mode = Mode::Watch,
            "--assign" => {
                let exe = iter.next().ok_or("--assign <exe> <1..5>")?;
                let port = iter.next().ok_or("--assign <exe> <1..5>")?;
                let port = port
                    .parse()
                    .map_err(|_| format!("잘못된 프로필 번호: {}", port))?;
                mode = Mode::Assign { exe: exe.clone(), port };
            }
            "--unassign" => {
                let exe = iter.next().ok_or("--unassign 값이 필요합니다")?;
                mode = Mode::Unassign(exe.clone());
            }
            other => return Err(format!("알 수 없는 인자: {}", other)),
        }
    }
    Ok(mode)
}

fn print_help() {
    println!("AutoProfile {} ({})", env!("CARGO_PKG_VERSION"), env!("BUILD_DATE"));
    println!();
    println!("사용법:");
    println!("  autoprofile                  저장된 설정으로 시작");
    println!("  autoprofile --url <URL>      열 페이지 지정");
    println!("  autoprofile --port <N>       제어 서버 포트 (기본 3000)");
    println!("  autoprofile --headless       창 없이 실행");
    println!("  autoprofile --send <1..5>    실행 중인 앱에 프로필 전환 요청");
    println!("  autoprofile --watch          포그라운드 앱에 따라 자동 전환");
    println!("  autoprofile --assign <exe> <1..5>");
    println!("                               앱을 프로필에 지정 (--watch 용)");
    println!("  autoprofile --unassign <exe> 지정 해제");
    println!("  -h, --help                   도움말");
    println!();
    println!("설정 파일: {}", Config::config_path().display());
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::load();
    // 첫 실행이면 편집할 수 있게 기본 설정을 남긴다 (CLI 덮어쓰기 전)
    if !Config::config_path().exists() {
        config.save();
    }

    match parse_args(&args, &mut config) {
        Ok(Mode::Help) => print_help(),
        Ok(Mode::Send(port)) => {
            std::process::exit(client::run_send(&config.control_url(), port));
        }
        Ok(Mode::Watch) => watcher::run_watch(&config),
        Ok(Mode::Assign { exe, port }) => {
            // CLI 덮어쓰기가 저장되지 않도록 파일에서 다시 읽는다
            let mut saved = Config::load();
            if !saved.assign(&exe, port) {
                eprintln!("❌ 지정 실패: {} → {} (1..5)", exe, port);
                std::process::exit(2);
            }
            saved.save();
            println!("✅ {} → port {}", watcher::normalize_exe(&exe), port);
        }
        Ok(Mode::Unassign(exe)) => {
            let mut saved = Config::load();
            if saved.unassign(&exe) {
                saved.save();
                println!("✅ {} 지정 해제", watcher::normalize_exe(&exe));
            } else {
                println!("{} 은(는) 지정되어 있지 않습니다", exe);
            }
        }
        Ok(Mode::Run) => {
            log_to_file(&format!(
                "main: v{} url={} port={} headless={}",
                env!("CARGO_PKG_VERSION"),
                config.app_url,
                config.control_port,
                config.headless
            ));
            println!("🎛️ AutoProfile");
            println!("🌐 {}", config.app_url);
            println!("🔌 {}", config.control_url());
            run_tray_app(config);
        }
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!();
            print_help();
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("autoprofile")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_args_runs_with_config() {
        let mut config = Config::default();
        assert_eq!(parse_args(&args(&[]), &mut config), Ok(Mode::Run));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn overrides_apply() {
        let mut config = Config::default();
        let mode = parse_args(
            &args(&["--url", "http://127.0.0.1:9000/", "--port", "3100", "--headless"]),
            &mut config,
        );
        assert_eq!(mode, Ok(Mode::Run));
        assert_eq!(config.app_url, "http://127.0.0.1:9000/");
        assert_eq!(config.control_port, 3100);
        assert!(config.headless);
    }

    #[test]
    fn send_mode_uses_port_override() {
        let mut config = Config::default();
        let mode = parse_args(&args(&["--port", "3200", "--send", "4"]), &mut config);
        assert_eq!(mode, Ok(Mode::Send(4)));
        assert_eq!(config.control_url(), "http://localhost:3200/control");
    }

    #[test]
    fn watch_and_assignment_modes() {
        let mut config = Config::default();
        assert_eq!(parse_args(&args(&["--watch"]), &mut config), Ok(Mode::Watch));
        assert_eq!(
            parse_args(&args(&["--assign", "Game.exe", "3"]), &mut config),
            Ok(Mode::Assign { exe: "Game.exe".into(), port: 3 })
        );
        assert_eq!(
            parse_args(&args(&["--unassign", "game.exe"]), &mut config),
            Ok(Mode::Unassign("game.exe".into()))
        );
        assert!(parse_args(&args(&["--assign", "game.exe"]), &mut config).is_err());
        assert!(parse_args(&args(&["--assign", "game.exe", "x"]), &mut config).is_err());
    }

    #[test]
    fn bad_args_are_errors() {
        let mut config = Config::default();
        assert!(parse_args(&args(&["--url"]), &mut config).is_err());
        assert!(parse_args(&args(&["--url", "nope"]), &mut config).is_err());
        assert!(parse_args(&args(&["--port", "huge"]), &mut config).is_err());
        assert!(parse_args(&args(&["--send", "x"]), &mut config).is_err());
        assert!(parse_args(&args(&["--frobnicate"]), &mut config).is_err());
        assert_eq!(parse_args(&args(&["-h"]), &mut config), Ok(Mode::Help));
    }
}
