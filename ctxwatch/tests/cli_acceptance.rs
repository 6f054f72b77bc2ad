use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    project: PathBuf,
    tmp: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let project = base.join("project");
        let tmp = base.join("tmp");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        for dir in [&home, &project, &tmp, &xdg_config, &xdg_state] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        Self {
            _temp_dir: temp_dir,
            home,
            project,
            tmp,
            xdg_config,
            xdg_state,
        }
    }

    fn claude_dir(&self) -> PathBuf {
        self.home.join(".claude")
    }

    fn learning_dir(&self) -> PathBuf {
        self.project.join(".claude/learning/sessions")
    }

    /// Make `session_id` the active session with the given transcript lines.
    fn seed_session(&self, session_id: &str, lines: &[String]) -> PathBuf {
        let partition = self.claude_dir().join("projects/-tmp-project");
        fs::create_dir_all(&partition).expect("failed to create project partition");

        let transcript = partition.join(format!("{session_id}.jsonl"));
        fs::write(&transcript, lines.join("\n")).expect("failed to write transcript");
        fs::write(
            self.claude_dir().join("history.jsonl"),
            format!("{{\"display\":\"hi\",\"sessionId\":\"{session_id}\"}}\n"),
        )
        .expect("failed to write history");
        transcript
    }

    fn write_config(&self, toml: &str) {
        let dir = self.xdg_config.join("ctxwatch");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), toml).expect("failed to write config");
    }
}

fn assistant(input_tokens: u64) -> String {
    format!(
        r#"{{"type":"assistant","message":{{"content":[{{"type":"tool_use","name":"Bash","input":{{"command":"git diff"}}}}],"usage":{{"input_tokens":{input_tokens},"output_tokens":10}}}}}}"#
    )
}

fn user(text: &str) -> String {
    format!(r#"{{"type":"user","message":{{"content":"{text}"}}}}"#)
}

fn command(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Command {
    let bin_path = match bin_name {
        "ctxwatch-monitor" => PathBuf::from(assert_cmd::cargo::cargo_bin!("ctxwatch-monitor")),
        "ctxwatch-learn" => PathBuf::from(assert_cmd::cargo::cargo_bin!("ctxwatch-learn")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);
    command
        .args(args)
        .current_dir(&env.project)
        .env("HOME", &env.home)
        .env("TMPDIR", &env.tmp)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG");
    command
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    command(env, bin_name, args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn run_bin_with_stdin(env: &CliTestEnv, bin_name: &str, stdin: &str) -> Output {
    let mut child = command(env, bin_name, &[])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn {bin_name}: {e}"));

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write hook payload");

    child
        .wait_with_output()
        .unwrap_or_else(|e| panic!("failed to wait for {bin_name}: {e}"))
}

/// Spawn with a stdin pipe the test keeps open, optionally after writing
/// `payload` into it.
fn spawn_with_open_stdin(env: &CliTestEnv, bin_name: &str, payload: Option<&str>) -> Child {
    let mut child = command(env, bin_name, &[])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn {bin_name}: {e}"));

    if let Some(payload) = payload {
        let stdin = child.stdin.as_mut().expect("stdin should be piped");
        stdin
            .write_all(payload.as_bytes())
            .expect("failed to write hook payload");
        stdin.flush().expect("failed to flush hook payload");
    }
    child
}

fn wait_at_most(child: &mut Child, limit: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            return Some(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn log_lines(dir: &Path) -> Vec<serde_json::Value> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .flat_map(|entry| {
            fs::read_to_string(entry.path())
                .expect("failed to read partition")
                .lines()
                .map(|line| serde_json::from_str(line).expect("log line should be JSON"))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn monitor_is_silent_without_a_session() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "ctxwatch-monitor", &[]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stderr.is_empty());
    assert!(output.stdout.is_empty());
}

#[test]
fn monitor_warns_at_sixty_five_percent() {
    let env = CliTestEnv::new();
    env.seed_session("warn-session", &[user("refactor the cache layer"), assistant(130_000)]);

    let output = run_bin(&env, "ctxwatch-monitor", &[]);

    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Context: 65% (130,000/200k)"),
        "expected a warn advisory, got:\n{stderr}"
    );
    assert!(stderr.contains("wrap up at 85% maximum"));
}

#[test]
fn monitor_blocks_at_stop_threshold() {
    let env = CliTestEnv::new();
    env.seed_session("stop-session", &[assistant(150_000), assistant(172_000)]);

    let output = run_bin(&env, "ctxwatch-monitor", &[]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CONTEXT LIMIT: 86% (172,000/200k)"));
    assert!(stderr.contains("/clear"));
}

#[test]
fn monitor_caches_within_ttl_unless_disabled() {
    let env = CliTestEnv::new();
    let transcript = env.seed_session("cached-session", &[assistant(20_000)]);

    let first = run_bin(&env, "ctxwatch-monitor", &[]);
    assert_eq!(first.status.code(), Some(0));
    assert!(env
        .tmp
        .join(".claude_context_cache/cached-session.json")
        .exists());

    fs::write(&transcript, assistant(190_000)).expect("failed to grow transcript");

    let cached = run_bin(&env, "ctxwatch-monitor", &[]);
    assert_eq!(cached.status.code(), Some(0));
    assert!(cached.stderr.is_empty());

    let fresh = run_bin(&env, "ctxwatch-monitor", &["--no-cache"]);
    assert_eq!(fresh.status.code(), Some(2));
}

#[test]
fn monitor_prefers_hook_payload() {
    let env = CliTestEnv::new();
    env.seed_session("history-session", &[assistant(1_000)]);
    let other = env.project.join("payload-transcript.jsonl");
    fs::write(&other, assistant(180_000)).expect("failed to write transcript");

    let payload = serde_json::json!({
        "session_id": "payload-session",
        "transcript_path": other,
        "hook_event_name": "PostToolUse",
    });
    let output = run_bin_with_stdin(&env, "ctxwatch-monitor", &payload.to_string());

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn monitor_does_not_wait_on_an_open_stdin() {
    let env = CliTestEnv::new();

    let mut child = spawn_with_open_stdin(&env, "ctxwatch-monitor", None);
    let status = wait_at_most(&mut child, Duration::from_secs(5));
    drop(child.stdin.take());

    assert_eq!(status.and_then(|s| s.code()), Some(0));
}

#[test]
fn monitor_acts_on_a_payload_before_stdin_closes() {
    let env = CliTestEnv::new();
    let transcript = env.project.join("payload-transcript.jsonl");
    fs::write(&transcript, assistant(180_000)).expect("failed to write transcript");

    let payload = serde_json::json!({
        "session_id": "payload-transcript",
        "transcript_path": transcript,
    });
    let mut child = spawn_with_open_stdin(&env, "ctxwatch-monitor", Some(&payload.to_string()));
    let status = wait_at_most(&mut child, Duration::from_secs(5));
    drop(child.stdin.take());

    assert_eq!(status.and_then(|s| s.code()), Some(2));
}

#[test]
fn learn_does_not_wait_on_an_open_stdin() {
    let env = CliTestEnv::new();

    let mut child = spawn_with_open_stdin(&env, "ctxwatch-learn", None);
    let status = wait_at_most(&mut child, Duration::from_secs(5));
    drop(child.stdin.take());

    assert_eq!(status.and_then(|s| s.code()), Some(0));
}

#[test]
fn monitor_session_flag_ignores_payload_transcript() {
    let env = CliTestEnv::new();
    env.seed_session("flag-session", &[assistant(1_000)]);
    let other = env.project.join("payload-transcript.jsonl");
    fs::write(&other, assistant(180_000)).expect("failed to write transcript");

    let payload = serde_json::json!({
        "session_id": "payload-session",
        "transcript_path": other,
    });
    let mut child = command(&env, "ctxwatch-monitor", &["--session", "flag-session"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn ctxwatch-monitor");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(payload.to_string().as_bytes())
        .expect("failed to write hook payload");
    let output = child.wait_with_output().expect("failed to wait for ctxwatch-monitor");

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stderr.is_empty());
}

#[test]
fn monitor_reads_explicit_transcript() {
    let env = CliTestEnv::new();
    let transcript = env.project.join("adhoc.jsonl");
    fs::write(&transcript, assistant(140_000)).expect("failed to write transcript");

    let output = run_bin(
        &env,
        "ctxwatch-monitor",
        &["--transcript", transcript.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Context: 70%"));
}

#[test]
fn monitor_honors_config_and_survives_a_bad_one() {
    let env = CliTestEnv::new();
    env.seed_session("config-session", &[assistant(100_000)]);

    env.write_config("[monitor]\nwarn_threshold = 40.0\nstop_threshold = 50.0\n");
    let strict = run_bin(&env, "ctxwatch-monitor", &["--no-cache"]);
    assert_eq!(strict.status.code(), Some(2));

    env.write_config("[monitor]\nwarn_threshold = 90.0\nstop_threshold = 80.0\n");
    let fallback = run_bin(&env, "ctxwatch-monitor", &["--no-cache"]);
    assert_eq!(fallback.status.code(), Some(0));
    assert!(fallback.stderr.is_empty());
}

#[test]
fn learn_appends_one_line_per_run() {
    let env = CliTestEnv::new();
    env.seed_session(
        "learn-session-with-a-long-id",
        &[
            user("/plan the storage migration"),
            assistant(5_000),
            user("now run the migration tests"),
            assistant(9_000),
        ],
    );

    let output = run_bin(&env, "ctxwatch-learn", &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stderr.is_empty());

    let lines = log_lines(&env.learning_dir());
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["session_id"], "learn-session-wi");
    assert_eq!(lines[0]["turn_count"], 2);
    assert_eq!(lines[0]["tools_called"]["Bash"], 2);
    assert_eq!(lines[0]["commands_used"], serde_json::json!(["git"]));
    assert_eq!(lines[0]["slash_commands"], serde_json::json!(["/plan"]));
    assert_eq!(lines[0]["tokens"]["input"], 14_000);

    run_bin(&env, "ctxwatch-learn", &[]);
    assert_eq!(log_lines(&env.learning_dir()).len(), 2);
}

#[test]
fn learn_skips_short_sessions() {
    let env = CliTestEnv::new();
    env.seed_session("short-session", &[user("just one question"), assistant(1_000)]);

    let output = run_bin(&env, "ctxwatch-learn", &[]);

    assert_eq!(output.status.code(), Some(0));
    assert!(!env.learning_dir().exists());
}

#[test]
fn learn_dry_run_prints_record() {
    let env = CliTestEnv::new();
    env.seed_session(
        "dry-session",
        &[user("first prompt of many"), user("second prompt of many")],
    );

    let output = run_bin(&env, "ctxwatch-learn", &["--dry-run"]);

    assert_eq!(output.status.code(), Some(0));
    let record: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("dry run should print JSON");
    assert_eq!(record["turn_count"], 2);
    assert!(record.get("session_id").is_none());
    assert!(!env.learning_dir().exists());
}

#[test]
fn learn_without_session_exits_cleanly() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "ctxwatch-learn", &[]);

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}
