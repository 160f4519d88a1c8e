use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::azure::{AzureDevOpsClient, AzureError, RepositoryClient, RepositoryCoordinates};
use crate::config::Config;
use crate::credentials::CredentialSource;
use crate::error::AppError;
use crate::input::{self, InputError, Prompter, Question};
use crate::pr::{self, processor, PullRequestSummary};
use crate::report::{self, ProcessedRecord, ReportRenderer, XlsxRenderer};
use crate::store::{ConfigStore, StateKey};

/// Options of the `list` command.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Release date as dd-mm-yyyy; prompted for when None
    pub since: Option<String>,
    /// Workspace root receiving the spreadsheet
    pub workspace: PathBuf,
    /// Dump the retrieved pull requests as JSON on stdout
    pub json: bool,
}

/// Options of the `change-repo` command. Missing values are prompted for.
#[derive(Debug, Clone, Default)]
pub struct ChangeRepositoryOptions {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub repository_id: Option<String>,
}

/// What a successful `list` produced.
#[derive(Debug)]
pub struct ListOutcome {
    pub pull_requests: Vec<PullRequestSummary>,
    pub records: Vec<ProcessedRecord>,
    pub output: PathBuf,
}

/// The two user-facing commands, wired to their collaborators.
pub struct Commands {
    config: Config,
    store: Box<dyn ConfigStore>,
    credentials: Box<dyn CredentialSource>,
    prompter: Box<dyn Prompter>,
}

impl Commands {
    pub fn new(
        config: Config,
        store: Box<dyn ConfigStore>,
        credentials: Box<dyn CredentialSource>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            config,
            store,
            credentials,
            prompter,
        }
    }

    /// Full pipeline: make sure the repository and credential are set up,
    /// retrieve the release's pull requests, classify them and write the
    /// spreadsheet into the workspace.
    #[instrument(skip(self))]
    pub async fn list_release_components(
        &mut self,
        options: ListOptions,
    ) -> Result<ListOutcome, AppError> {
        debug!(configured = self.store.is_configured(), "checking stored settings");
        if !self.store.has_coordinates() {
            info!("no default repository configured, asking for one");
            let coordinates = input::ask_coordinates(self.prompter.as_mut())?;
            self.store.set_coordinates(&coordinates)?;
        }
        let coordinates = self
            .store
            .coordinates()
            .ok_or(AzureError::Unconfigured("repository coordinates"))?;

        if !self.store.has_credentials() {
            info!("no credential cached, asking the credential helper");
            self.refresh_credentials(&coordinates).await?;
        }

        let date = match options.since.as_deref() {
            Some(text) => input::parse_release_date(text)?,
            None => input::ask_release_date(self.prompter.as_mut())?,
        };
        let output = report::output_path(&options.workspace, &self.config.report.file_name)?;

        let author_id = self
            .store
            .author_id()
            .ok_or(AzureError::Unconfigured("author id"))?;
        let client = self.client(&coordinates, self.store.access_token())?;

        let pull_requests =
            pr::retrieve_pull_requests(&client, &author_id, release_start(date)).await?;
        info!(pull_requests = pull_requests.len(), "retrieved pull requests");
        if options.json {
            println!("{}", serde_json::to_string_pretty(&pull_requests)?);
        }
        let records = processor::process_pull_requests(&pull_requests, &self.config.report.owner)?;

        XlsxRenderer::new(self.config.work_item_url(&coordinates)).render(&records, &output)?;
        info!(records = records.len(), output = %output.display(), "wrote release components");

        Ok(ListOutcome {
            pull_requests,
            records,
            output,
        })
    }

    /// Replace the default repository and refresh the credential for it.
    #[instrument(skip(self))]
    pub async fn change_default_repository(
        &mut self,
        options: ChangeRepositoryOptions,
    ) -> Result<RepositoryCoordinates, AppError> {
        let coordinates = RepositoryCoordinates::new(
            self.answer(options.organization, &input::ORGANIZATION)?,
            self.answer(options.project, &input::PROJECT)?,
            self.answer(options.repository_id, &input::REPOSITORY_ID)?,
        );
        self.store.set_coordinates(&coordinates)?;
        self.refresh_credentials(&coordinates).await?;

        info!(
            organization = %coordinates.organization,
            project = %coordinates.project,
            repository = %coordinates.repository_id,
            "default repository changed"
        );
        Ok(coordinates)
    }

    /// Use a value given on the command line, or ask for it.
    fn answer(&mut self, given: Option<String>, question: &Question) -> Result<String, InputError> {
        match given {
            Some(value) => match (question.validate)(&value) {
                None => Ok(value),
                Some(reason) => Err(InputError::Invalid {
                    field: question.field,
                    reason,
                }),
            },
            None => input::ask(self.prompter.as_mut(), question),
        }
    }

    /// Fetch a credential from the helper, persist it and resolve the
    /// author id it belongs to.
    async fn refresh_credentials(
        &mut self,
        coordinates: &RepositoryCoordinates,
    ) -> Result<(), AppError> {
        let credentials = self.credentials.credentials(coordinates).await?;
        self.store
            .set_credential(&credentials.email, &credentials.access_token)?;

        let client = self.client(coordinates, Some(credentials.access_token.clone()))?;
        let author_id = client.resolve_author_id(&credentials.email).await?;
        self.store.set(StateKey::AuthorId, &author_id)?;
        debug!(email = %credentials.email, author_id = %author_id, "resolved author id");
        Ok(())
    }

    fn client(
        &self,
        coordinates: &RepositoryCoordinates,
        access_token: Option<String>,
    ) -> Result<AzureDevOpsClient, AzureError> {
        AzureDevOpsClient::new(
            &self.config.azure.base_url,
            Some(coordinates.clone()),
            access_token,
        )
    }
}

/// Release dates are taken as midnight UTC.
fn release_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
