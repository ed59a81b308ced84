use crate::infra::{in_memory_runtime, InMemoryAdmissionsService};
use admissions::config::AdmissionsConfig;
use admissions::error::AppError;
use admissions::workflows::admissions::lifecycle::valid_transitions;
use admissions::workflows::admissions::{
    Actor, ApplicationDetails, ApplicationId, ApplicationStatus, DocumentType, DocumentUpload,
    FeeKind, ProgramId,
};
use clap::Args;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Program the demo applicant applies to.
    #[arg(long, default_value = "msc-computer-science")]
    pub(crate) program: String,
    /// Reject the application instead of approving it.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Stop before the fee is paid to show the payment gate refusing submission.
    #[arg(long)]
    pub(crate) skip_payment: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        program,
        reject,
        skip_payment,
    } = args;

    let config = AdmissionsConfig::default();
    let runtime = in_memory_runtime(&config);
    let service = runtime.service;
    let student = Actor::student("student-demo");
    let admin = Actor::admin("admin-demo");

    println!("Admissions lifecycle demo");
    let draft = service.create_draft(
        &student,
        ProgramId(program.clone()),
        ApplicationDetails {
            personal_statement: Some("Interested in compilers and databases.".to_string()),
            intended_start_term: Some("2027-fall".to_string()),
            previous_institution: Some("Demo State University".to_string()),
        },
    )?;
    println!("  Draft {} opened for {}", draft.id, program);

    let required: Vec<DocumentType> = config
        .requirements
        .required_for(&draft.program_id)
        .iter()
        .copied()
        .collect();
    let (last, first) = match required.split_last() {
        Some((last, first)) => (Some(*last), first.to_vec()),
        None => (None, Vec::new()),
    };

    for document_type in &first {
        upload(&service, &draft.id, &student, *document_type);
    }
    attempt_submit(&service, &draft.id, &student);

    if let Some(document_type) = last {
        upload(&service, &draft.id, &student, document_type);
    }
    attempt_submit(&service, &draft.id, &student);

    if skip_payment {
        println!("  Payment skipped; application stays in draft");
        return Ok(());
    }

    runtime
        .ledger
        .record_payment(draft.id.clone(), FeeKind::Application)?;
    println!("  Application fee confirmed");
    if !attempt_submit(&service, &draft.id, &student) {
        return Ok(());
    }

    let decision = if reject {
        ApplicationStatus::Rejected
    } else {
        ApplicationStatus::Approved
    };
    let review_started =
        review_step(&service, &draft.id, &admin, ApplicationStatus::UnderReview, None)
            && review_step(
                &service,
                &draft.id,
                &admin,
                ApplicationStatus::DocumentsRequested,
                Some("Please add a language certificate".to_string()),
            );
    if !review_started {
        return Ok(());
    }
    upload(&service, &draft.id, &student, DocumentType::LanguageCertificate);
    if !(review_step(&service, &draft.id, &admin, ApplicationStatus::UnderReview, None)
        && review_step(&service, &draft.id, &admin, decision, None))
    {
        return Ok(());
    }

    println!("\nStatus history");
    match service.history(&draft.id) {
        Ok(entries) => {
            for entry in entries {
                println!(
                    "  {} {} -> {} by {}: {}",
                    entry.recorded_at.format("%H:%M:%S"),
                    entry.from,
                    entry.to,
                    entry.actor_id,
                    entry.comment
                );
            }
        }
        Err(err) => println!("  History unavailable: {err}"),
    }

    drop(service);
    match runtime.delivery.await {
        Ok(stats) => println!(
            "\nNotifications: {} delivered, {} retried, {} dropped",
            stats.delivered, stats.retried, stats.dropped
        ),
        Err(err) => println!("\nNotification worker stopped unexpectedly: {err}"),
    }

    Ok(())
}

pub(crate) fn print_transition_table() {
    println!("Application status graph");
    for status in ApplicationStatus::ALL {
        let targets = valid_transitions(status);
        if targets.is_empty() {
            println!("  {:<20} (terminal)", status.label());
        } else {
            let labels: Vec<&str> = targets.iter().map(|target| target.label()).collect();
            println!("  {:<20} -> {}", status.label(), labels.join(", "));
        }
    }
}

fn upload(
    service: &InMemoryAdmissionsService,
    application_id: &ApplicationId,
    student: &Actor,
    document_type: DocumentType,
) {
    let request = DocumentUpload {
        document_type,
        storage_key: format!("demo/{application_id}/{}.pdf", document_type.label()),
        size_bytes: 64 * 1024,
        mime_type: "application/pdf".to_string(),
    };
    match service.upload_document(application_id, student, request) {
        Ok(document) => println!("  Uploaded {} ({})", document.document_type, document.id),
        Err(err) => println!("  Upload refused: {err}"),
    }
}

fn attempt_submit(
    service: &InMemoryAdmissionsService,
    application_id: &ApplicationId,
    student: &Actor,
) -> bool {
    match service.submit(application_id, student) {
        Ok(application) => {
            println!("  Submitted; status is now {}", application.status);
            true
        }
        Err(err) => {
            println!("  Submission refused: {err}");
            false
        }
    }
}

fn review_step(
    service: &InMemoryAdmissionsService,
    application_id: &ApplicationId,
    admin: &Actor,
    target: ApplicationStatus,
    comment: Option<String>,
) -> bool {
    match service.transition(application_id, admin, target, comment) {
        Ok(application) => {
            println!("  Admin moved application to {}", application.status);
            true
        }
        Err(err) => {
            println!("  Review step failed: {err}");
            false
        }
    }
}
