//! End-to-end tests over TCP: wire forms, admin console, worker role.

mod test_harness;

use code_judge::client::JudgeClient;
use code_judge::gateway::worker_service::ADMIN_REJECTED;
use code_judge::protocol::AdminRequest;
use test_harness::{skip_without, test_master_config, TestMaster, TestWorker};

async fn master() -> (TestMaster, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let master = TestMaster::start(test_master_config(root.path(), Vec::new())).await;
    (master, root)
}

// =============================================================================
// Admin console
// =============================================================================

#[tokio::test]
async fn test_set_max_tasks_then_get_info() {
    let (master, _root) = master().await;
    let client = JudgeClient::new(master.addr);

    let reply = client.send(b"ADMIN|SET_MAX_TASKS 7").await.unwrap();
    assert_eq!(reply, "OK: MAX_TASKS is now 7.\n");

    let info = client.send(b"ADMIN|GET_INFO").await.unwrap();
    assert!(info.starts_with("INFO:\n"), "{info}");
    assert!(info.contains("MAX_TASKS: 7"), "{info}");
    assert_eq!(master.context.snapshot().max_tasks, 7);

    master.stop().await;
}

#[tokio::test]
async fn test_zero_max_tasks_rejected() {
    let (master, _root) = master().await;
    let client = JudgeClient::new(master.addr);

    let reply = client.send(b"ADMIN|SET_MAX_TASKS|0").await.unwrap();
    assert!(reply.starts_with("Error:"), "{reply}");
    assert_eq!(master.context.snapshot().max_tasks, 3);

    let reply = client.send(b"ADMIN|SET_MAX_TASKS|lots").await.unwrap();
    assert!(reply.starts_with("Error:"), "{reply}");

    master.stop().await;
}

#[tokio::test]
async fn test_set_max_workers_and_json_info() {
    let (master, _root) = master().await;
    let client = JudgeClient::new(master.addr);

    let request = AdminRequest {
        token: None,
        subcommand: "SET_MAX_SLAVES".into(),
        argument: Some("2".into()),
    };
    assert_eq!(client.admin(&request).await.unwrap(), "OK: MAX_WORKERS is now 2.\n");

    let json = client.send(b"ADMIN|GET_INFO|json").await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["max_workers"], 2);
    assert_eq!(value["running_tasks"], 0);

    master.stop().await;
}

#[tokio::test]
async fn test_unknown_admin_subcommand() {
    let (master, _root) = master().await;
    let reply = JudgeClient::new(master.addr)
        .send(b"admin|SELF_DESTRUCT")
        .await
        .unwrap();
    assert!(reply.starts_with("Error:"), "{reply}");
    assert!(reply.contains("SELF_DESTRUCT"), "{reply}");
    master.stop().await;
}

// =============================================================================
// Protocol errors
// =============================================================================

#[tokio::test]
async fn test_malformed_requests_get_diagnostics() {
    let (master, _root) = master().await;
    let client = JudgeClient::new(master.addr);

    let reply = client.send(b"just some words").await.unwrap();
    assert!(reply.starts_with("Error: Invalid request"), "{reply}");

    let reply = client.send(b"python|only-two").await.unwrap();
    assert!(reply.starts_with("Error: Invalid request"), "{reply}");

    let reply = client.send(b"PYTHON\nforty\nprint(1)").await.unwrap();
    assert!(reply.contains("invalid code length"), "{reply}");

    let reply = client.send(b"PYTHON\n100\nprint(1)").await.unwrap();
    assert!(reply.contains("connection ended"), "{reply}");

    assert_eq!(master.context.running_tasks(), 0);
    master.stop().await;
}

#[tokio::test]
async fn test_unsupported_language_over_tcp() {
    let (master, _root) = master().await;
    let reply = JudgeClient::new(master.addr)
        .submit("rust", "main.rs", "fn main() {}")
        .await
        .unwrap();
    assert_eq!(reply, "Error: Unsupported or unknown language\n");
    master.stop().await;
}

// =============================================================================
// Execution over both wire forms
// =============================================================================

#[tokio::test]
async fn test_delimited_python_roundtrip() {
    if skip_without("python3") {
        return;
    }
    let (master, _root) = master().await;
    let reply = JudgeClient::new(master.addr)
        .submit("python", "calc.py", "print(2+2)")
        .await
        .unwrap();
    assert_eq!(reply, "Output:\n4\n\n");
    master.stop().await;
}

#[tokio::test]
async fn test_legacy_python_roundtrip() {
    if skip_without("python3") {
        return;
    }
    let (master, _root) = master().await;
    let source = "for i in range(3):\n    print(i)\n";
    let reply = JudgeClient::new(master.addr)
        .submit_legacy("PYTHON", source)
        .await
        .unwrap();
    assert_eq!(reply, "Output:\n0\n1\n2\n\n");
    master.stop().await;
}

#[tokio::test]
async fn test_source_may_contain_separator() {
    if skip_without("python3") {
        return;
    }
    let (master, _root) = master().await;
    let reply = JudgeClient::new(master.addr)
        .submit("python", "pipes.py", "print('a|b|c')")
        .await
        .unwrap();
    assert_eq!(reply, "Output:\na|b|c\n\n");
    master.stop().await;
}

// =============================================================================
// Worker role
// =============================================================================

#[tokio::test]
async fn test_worker_rejects_admin() {
    let root = tempfile::tempdir().unwrap();
    let worker = TestWorker::start(root.path()).await;
    let reply = JudgeClient::new(worker.addr)
        .send(b"ADMIN|GET_INFO")
        .await
        .unwrap();
    assert_eq!(reply, ADMIN_REJECTED);
}

#[tokio::test]
async fn test_worker_accepts_legacy_form() {
    if skip_without("python3") {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let worker = TestWorker::start(root.path()).await;
    let reply = JudgeClient::new(worker.addr)
        .submit_legacy("PYTHON", "print('w')")
        .await
        .unwrap();
    assert_eq!(reply, "Output:\nw\n\n");
    worker.stop();
}
