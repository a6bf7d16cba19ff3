mod common;

use axum::body::Bytes;
use jobtrack_api::error::ApiError;
use jobtrack_api::intake::{ApplicationInput, DetailInput, IntakeSubmission, submit};
use jobtrack_api::upload::UploadedFile;
use jobtrack_db::queries::{applications, resumes};

use common::{account, count, files_in, harness, resume};

fn submission() -> IntakeSubmission {
    IntakeSubmission {
        application: ApplicationInput {
            job_name: "Backend Engineer".into(),
            company: "Acme".into(),
            country: Some("Poland".into()),
            city: Some("Gdańsk".into()),
            apply_date: "2025-05-02".into(),
            valid_to: "2025-06-01".into(),
            ..Default::default()
        },
        detail: DetailInput {
            salary_range: Some("20-25k".into()),
            ..Default::default()
        },
        resume: None,
        new_resume: None,
    }
}

fn pdf(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        data: Bytes::from_static(b"%PDF-1.4 test"),
    }
}

fn assert_nothing_written(state: &jobtrack_api::state::AppState) {
    assert_eq!(count(state, "job_applications"), 0);
    assert_eq!(count(state, "job_application_accounts"), 0);
    assert_eq!(count(state, "application_details"), 0);
    assert_eq!(count(state, "application_detail_resumes"), 0);
}

#[tokio::test]
async fn existing_resume_is_attached_to_the_detail() {
    let h = harness().await;
    let owner = account(&h.state, "jan");
    let cv = resume(&h.state, owner, "General CV");

    let outcome = submit(
        &h.state,
        owner,
        "jan",
        IntakeSubmission {
            resume: Some(cv.to_string()),
            ..submission()
        },
    )
    .await
    .expect("intake succeeds");

    assert_eq!(outcome.new_resume_id, None);
    let attached = h
        .state
        .db
        .with_conn(|conn| applications::resumes_for_detail(conn, outcome.detail_id))
        .expect("attached resumes");
    assert_eq!(attached.iter().map(|r| r.id).collect::<Vec<_>>(), vec![cv]);
    assert_eq!(count(&h.state, "job_applications"), 1);
    assert_eq!(count(&h.state, "job_application_accounts"), 1);
    assert_eq!(count(&h.state, "application_details"), 1);
    assert_eq!(count(&h.state, "resumes"), 1);
    assert_eq!(files_in(&h, "resumes"), 0);

    let owned = h
        .state
        .db
        .with_conn(|conn| {
            applications::application_for_account(conn, outcome.application_id, owner)
        })
        .expect("lookup");
    assert!(owned.is_some());
}

#[tokio::test]
async fn uploaded_resume_is_stored_and_attached() {
    let h = harness().await;
    let owner = account(&h.state, "anna");

    let outcome = submit(
        &h.state,
        owner,
        "anna",
        IntakeSubmission {
            resume: Some("upload_new".into()),
            new_resume: Some(pdf("anna cv.pdf")),
            ..submission()
        },
    )
    .await
    .expect("intake succeeds");

    let new_id = outcome.new_resume_id.expect("a resume was created");
    let row = h
        .state
        .db
        .with_conn(|conn| resumes::resume_by_id(conn, new_id))
        .expect("lookup")
        .expect("resume row");
    assert_eq!(row.account_id, owner);
    assert_eq!(row.description, "anna cv.pdf");
    assert_eq!(row.job_title.as_deref(), Some("Backend Engineer"));

    let path = row.file.expect("stored path");
    assert!(path.starts_with("resumes/anna_BackendEngineer_"));
    assert!(path.ends_with(".pdf"));
    assert!(h.state.storage.exists(&path).await.expect("exists check"));

    let attached = h
        .state
        .db
        .with_conn(|conn| applications::resumes_for_detail(conn, outcome.detail_id))
        .expect("attached resumes");
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id, new_id);

    assert_eq!(count(&h.state, "job_applications"), 1);
    assert_eq!(count(&h.state, "application_details"), 1);
    assert_eq!(count(&h.state, "resumes"), 1);
    assert_eq!(files_in(&h, "resumes"), 1);
}

#[tokio::test]
async fn a_file_without_a_choice_counts_as_an_upload() {
    let h = harness().await;
    let owner = account(&h.state, "ewa");

    let outcome = submit(
        &h.state,
        owner,
        "ewa",
        IntakeSubmission {
            new_resume: Some(pdf("cv.pdf")),
            ..submission()
        },
    )
    .await
    .expect("intake succeeds");

    assert!(outcome.new_resume_id.is_some());
    assert_eq!(files_in(&h, "resumes"), 1);
}

#[tokio::test]
async fn someone_elses_resume_is_not_found_and_nothing_is_written() {
    let h = harness().await;
    let owner = account(&h.state, "piotr");
    let stranger = account(&h.state, "marta");
    let foreign_cv = resume(&h.state, stranger, "Marta's CV");

    let err = submit(
        &h.state,
        owner,
        "piotr",
        IntakeSubmission {
            resume: Some(foreign_cv.to_string()),
            ..submission()
        },
    )
    .await
    .expect_err("foreign resume is rejected");

    assert!(matches!(err, ApiError::NotFound(_)), "got {err:?}");
    assert_nothing_written(&h.state);
}

#[tokio::test]
async fn upload_new_without_a_file_is_a_field_error() {
    let h = harness().await;
    let owner = account(&h.state, "adam");

    let err = submit(
        &h.state,
        owner,
        "adam",
        IntakeSubmission {
            resume: Some("upload_new".into()),
            ..submission()
        },
    )
    .await
    .expect_err("missing file is rejected");

    match err {
        ApiError::Validation(errors) => assert!(errors.has("new_resume")),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_nothing_written(&h.state);
}

#[tokio::test]
async fn invalid_application_writes_nothing_and_stores_no_file() {
    let h = harness().await;
    let owner = account(&h.state, "zofia");

    let mut bad = submission();
    bad.application.job_name = String::new();
    bad.application.valid_to = "31/12/2025".into();
    bad.new_resume = Some(pdf("cv.pdf"));

    let err = submit(&h.state, owner, "zofia", bad)
        .await
        .expect_err("invalid application is rejected");

    match err {
        ApiError::Validation(errors) => {
            assert!(errors.has("job_name"));
            assert!(errors.has("valid_to"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_nothing_written(&h.state);
    assert_eq!(count(&h.state, "resumes"), 0);
    assert_eq!(files_in(&h, "resumes"), 0);
}

#[tokio::test]
async fn failed_transaction_removes_the_uploaded_file() {
    let h = harness().await;

    // No such account: the association insert trips the foreign key.
    let err = submit(
        &h.state,
        4242,
        "ghost",
        IntakeSubmission {
            new_resume: Some(pdf("cv.pdf")),
            ..submission()
        },
    )
    .await
    .expect_err("unknown account fails");

    assert!(matches!(err, ApiError::Internal(_)), "got {err:?}");
    assert_nothing_written(&h.state);
    assert_eq!(count(&h.state, "resumes"), 0);
    assert_eq!(files_in(&h, "resumes"), 0);
}
