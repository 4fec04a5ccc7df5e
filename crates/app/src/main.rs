use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use checkin_core::Clock;
use checkin_core::model::{
    CheckinNo, ClassId, ClassSession, Classroom, Question, QuestionNo, SessionKey, StudentProfile,
};
use clap::Parser;
use services::{
    AnswerRequest, CheckinError, CheckinRequest, ClassroomServices, EventCallback,
    IdentityProvider, QuestionEvent,
};
use storage::repository::{ClassRepository, ProfileRepository, SessionRepository};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;

use config::{AppConfig, Command, prepare_sqlite_file};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Refresh cadence for open-session adoption while watching.
const REFRESH_EVERY: Duration = Duration::from_secs(5);

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_event(event: &QuestionEvent) {
    match event {
        QuestionEvent::Shown { session, question } => {
            println!("[{session}] question {}: {}", question.question_no, question.text);
        }
        QuestionEvent::Hidden { session } => println!("[{session}] question hidden"),
    }
}

fn checkin_status(key: &SessionKey, checked_in: Result<bool, CheckinError>) -> &'static str {
    match checked_in {
        Ok(true) => "checked in",
        Ok(false) => "open",
        Err(err) => {
            tracing::warn!(session = %key, error = %err, "could not read check-in status");
            "unknown"
        }
    }
}

fn class_id(raw: &str) -> AppResult<ClassId> {
    Ok(ClassId::new(raw)?)
}

async fn run(config: AppConfig) -> AppResult<()> {
    let db_url = config.database_url();
    prepare_sqlite_file(&db_url)?;

    let identity = Arc::new(config.identity()?);
    let (tx, mut events) = mpsc::unbounded_channel();
    let on_event: EventCallback = Arc::new(move |event: QuestionEvent| {
        let _ = tx.send(event);
    });
    let services = ClassroomServices::new_sqlite(
        &db_url,
        Clock::system(),
        config.poll_interval(),
        identity.clone(),
        on_event,
    )
    .await?;
    tracing::debug!(db_url = %db_url, "storage ready");

    match config.command {
        Command::Join { class_id } => {
            let class = services.enrollment().join_class(&class_id).await?;
            println!("joined {} ({})", class.name, class.label());
        }
        Command::Classes => {
            for class in services.enrollment().list_classes().await? {
                println!("{}\t{}\t{}", class.id, class.label(), class.name);
            }
        }
        Command::Sessions { class_id: raw } => {
            let class_id = class_id(&raw)?;
            let attendance = services.attendance();
            for session in attendance.open_sessions(&class_id).await? {
                let status =
                    checkin_status(session.key(), attendance.has_checked_in(session.key()).await);
                let question = session
                    .broadcast()
                    .map(|q| format!("question {}", q.question_no))
                    .unwrap_or_default();
                println!("#{}\t{status}\t{question}", session.key().checkin_no);
            }
        }
        Command::Checkin {
            class_id: raw,
            checkin_no,
            code,
            remark,
        } => {
            let request = CheckinRequest::new(class_id(&raw)?, checkin_no, code, remark);
            let record = services.attendance().check_in(request).await?;
            println!(
                "checked in to {} as {} at {}",
                record.session, record.display_name, record.submitted_at
            );
        }
        Command::Answer {
            class_id: raw,
            checkin_no,
            question_no,
            text,
            wait_ms,
        } => {
            let key = SessionKey::new(class_id(&raw)?, CheckinNo::new(checkin_no));
            let question_no = QuestionNo::new(question_no);
            let questions = services.questions();
            questions
                .subscribe(key.clone(), Arc::new(|_: QuestionEvent| {}))
                .await?;
            let deadline = tokio::time::Instant::now() + Duration::from_millis(wait_ms);
            let board = questions.board();
            while !board.is_showing(&key, question_no)
                && tokio::time::Instant::now() < deadline
            {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            let result = services
                .answers()
                .submit_answer(AnswerRequest::new(
                    key.class_id.clone(),
                    key.checkin_no,
                    question_no,
                    text,
                ))
                .await;
            questions.cancel().await;
            let record = result?;
            println!(
                "answer recorded for {} question {}",
                record.session, record.question_no
            );
        }
        Command::Watch { class_id: raw } => {
            let class_id = class_id(&raw)?;
            let recovery = services.recovery();
            if let Some(sub) = recovery.resume(&class_id).await? {
                println!("resumed {}", sub.key());
            }
            let mut refresh = tokio::time::interval(REFRESH_EVERY);
            refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    Some(event) = events.recv() => print_event(&event),
                    _ = refresh.tick() => {
                        if let Err(err) = recovery.refresh_open_sessions(&class_id).await {
                            tracing::warn!(class_id = %class_id, error = %err, "refresh failed");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            recovery.leave().await;
        }
        Command::Seed {
            class_id: raw,
            checkin_no,
            code,
            question,
            student_id,
            first_name,
            last_name,
        } => {
            let class_id = class_id(&raw)?;
            let storage = services.storage();
            storage
                .classes
                .upsert_class(&Classroom {
                    id: class_id.clone(),
                    name: "Demo class".into(),
                    code: Some(class_id.as_str().to_owned()),
                })
                .await?;
            if let Some(uid) = identity.current_user() {
                storage
                    .profiles
                    .upsert_profile(&StudentProfile {
                        uid,
                        student_id,
                        first_name,
                        last_name,
                        email: String::new(),
                    })
                    .await?;
            }
            let key = SessionKey::new(class_id, CheckinNo::new(checkin_no));
            let mut session = ClassSession::open(key.clone(), code, Clock::system().now())?;
            session.set_question(question.map(|text| Question::shown(QuestionNo::new(1), text)));
            storage.sessions.upsert_session(&session).await?;
            println!("seeded session {key}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let config = AppConfig::parse();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::StorageError;

    #[test]
    fn checkin_status_marks_failed_reads_unknown() {
        let key = SessionKey::new(ClassId::new("C1").unwrap(), CheckinNo::new(7));
        assert_eq!(checkin_status(&key, Ok(true)), "checked in");
        assert_eq!(checkin_status(&key, Ok(false)), "open");
        let failed = Err(CheckinError::Transport(StorageError::Connection("offline".into())));
        assert_eq!(checkin_status(&key, failed), "unknown");
    }
}
