use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const HSH: &str = env!("CARGO_BIN_EXE_hsh");

fn run_script(script: &Path, args: &[&str]) -> Output {
    Command::new(HSH)
        .arg(script)
        .args(args)
        .env_remove("HSH_LOG")
        .output()
        .expect("failed to run hsh")
}

fn run_stdin(input: &str) -> Output {
    let mut child = Command::new(HSH)
        .env_remove("HSH_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run hsh");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for hsh")
}

fn script(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("script.hsh");
    fs::write(&path, text).expect("write script");
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout not UTF-8")
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).expect("stderr not UTF-8")
}

#[test]
fn echo_from_piped_stdin() {
    let output = run_stdin("echo hello\n");
    assert_eq!(stdout(&output), "hello\n");
    assert_eq!(stderr(&output), "");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn piped_stdin_prints_no_prompt() {
    let output = run_stdin("echo a\necho b\n");
    assert_eq!(stdout(&output), "a\nb\n");
}

#[test]
fn unterminated_quote_in_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "echo first\n'unterminated\n");

    let output = run_script(&path, &[]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout(&output), "first\n");
    assert_eq!(
        stderr(&output),
        format!("{HSH}: 2: Syntax error: unterminated quoted string\n")
    );
}

#[test]
fn missing_command_does_not_stop_the_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "nonexistentcmd123\necho $?\n");

    let output = run_script(&path, &[]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "127\n");
    assert_eq!(stderr(&output), format!("{HSH}: 1: nonexistentcmd123: not found\n"));
}

#[test]
fn last_status_becomes_exit_status() {
    let output = run_stdin("echo ok\nnonexistentcmd123\n");
    assert_eq!(output.status.code(), Some(127));
}

#[test]
fn missing_script_file() {
    let output = run_script(Path::new("/nonexistent/hsh/script"), &[]);
    assert_eq!(output.status.code(), Some(127));
    assert_eq!(
        stderr(&output),
        format!("{HSH}: 0: Can't open /nonexistent/hsh/script\n")
    );
}

#[test]
fn exit_status_and_early_stop() {
    let output = run_stdin("exit 3\necho unreachable\n");
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(stdout(&output), "");
}

#[test]
fn script_arguments_are_positional_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "echo $# \"$1\" $2\n");

    let output = run_script(&path, &["first arg", "-x"]);
    assert_eq!(stdout(&output), "2 first arg -x\n");
}

#[test]
fn cd_then_pwd_in_script() {
    let dir = tempfile::tempdir().unwrap();
    let target = fs::canonicalize(dir.path()).unwrap();
    let path = script(&dir, &format!("cd {}\npwd\n", target.display()));

    let output = run_script(&path, &[]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), format!("{}\n", target.display()));
}

#[test]
fn alias_then_use() {
    let output = run_stdin("alias say='echo said'\nsay hi\n");
    assert_eq!(stdout(&output), "said hi\n");
}

#[test]
fn multiline_quote_from_stdin() {
    let output = run_stdin("echo \"one\ntwo\"\n");
    assert_eq!(stdout(&output), "one\ntwo\n");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn external_programs_receive_exported_variables() {
    let output = run_stdin("HSH_LOCAL=1\nexport HSH_SHARED=2\nsh -c 'echo \"[$HSH_LOCAL][$HSH_SHARED]\"'\n");
    assert_eq!(stdout(&output), "[][2]\n");
}

#[cfg(unix)]
#[test]
fn builtin_output_precedes_later_child_output() {
    let output = run_stdin("echo -n first\n/bin/echo second\n");
    assert_eq!(stdout(&output), "firstsecond\n");
}

#[cfg(unix)]
#[test]
fn missing_interpreter_reports_not_executable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad");
    fs::write(&bad, "#!/nonexistent/interp\n").unwrap();
    fs::set_permissions(&bad, fs::Permissions::from_mode(0o755)).unwrap();

    let output = run_stdin(&format!("{}\necho $?\n", bad.display()));
    assert_eq!(stdout(&output), "126\n");
    let err = stderr(&output);
    assert!(err.starts_with(&format!("{HSH}: 1: {}: cannot execute: ", bad.display())), "{err}");
    assert!(!err.contains("not found"), "{err}");
}

#[test]
fn crlf_script_lines() {
    let dir = tempfile::tempdir().unwrap();
    let target = fs::canonicalize(dir.path()).unwrap();
    let path = script(&dir, &format!("cd {}\r\npwd\r\necho done\r\n", target.display()));

    let output = run_script(&path, &[]);
    assert_eq!(stderr(&output), "");
    assert_eq!(stdout(&output), format!("{}\ndone\n", target.display()));
}
