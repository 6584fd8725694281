use mongodb::{
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, ClientSession, Collection,
};
use std::time::Duration;

use crate::{config::Config, errors::AppResult};

pub mod collections {
    pub const EXAM_DEFINITIONS: &str = "cbt_exams";
    pub const TIMETABLES: &str = "class_exam_timetables";
    pub const QUESTION_SETS: &str = "cbt_questions";
    pub const ATTEMPTS: &str = "cbt_results";
    pub const SUBJECT_RESULTS: &str = "subject_results";
    pub const STUDENT_RESULTS: &str = "results";
    pub const RECOMPUTATION_JOBS: &str = "recomputation_jobs";
    pub const SESSIONS: &str = "sessions";
    pub const CLASSES: &str = "classes";
    pub const ENROLMENTS: &str = "class_enrolments";
    pub const RESULT_SETTINGS: &str = "result_settings";
}

const DUPLICATE_KEY_CODE: i32 = 11000;

/// True when a write was rejected by a unique index.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

#[derive(Clone)]
pub struct Database {
    client: Client,
    db_name: String,
}

impl Database {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let mut client_options = ClientOptions::parse(&config.mongo_conn_string).await?;

        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);
        client_options.max_pool_size = Some(50);
        client_options.min_pool_size = Some(2);
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        log::info!("Successfully connected to MongoDB database '{}'", config.mongo_db_name);

        Ok(Self {
            client,
            db_name: config.mongo_db_name.clone(),
        })
    }

    pub fn get_collection<T>(&self, collection_name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client
            .database(&self.db_name)
            .collection(collection_name)
    }

    /// Opens a session with a transaction already started on it.
    pub async fn start_transaction(&self) -> AppResult<ClientSession> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(session)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}
