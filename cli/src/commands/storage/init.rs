use crate::context::Context;
use crate::error::Error;
use crate::prompt::Choice;
use crate::runner::{Runnable, Runner};
use crate::selector::WorkspaceSelector;
use crate::workspace::{Workspace, WorkspaceError};
use copilot_common::addon::{
    self, Attribute, AuroraProps, DynamoProps, Engine, OutputKind, S3Props, Storage, StorageType,
};
use copilot_common::model::WorkloadType;
use copilot_common::{naming, validate};

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the table, bucket or cluster
    #[arg(short, long)]
    name: Option<String>,

    /// One of DynamoDB, S3 or Aurora
    #[arg(short = 't', long = "storage-type")]
    kind: Option<String>,

    /// Workload the storage is attached to
    #[arg(short, long)]
    workload: Option<String>,

    /// Partition key of the table, e.g. "id:S"
    #[arg(long)]
    partition_key: Option<String>,

    /// Sort key of the table, e.g. "createdAt:N"
    #[arg(long, conflicts_with = "no_sort")]
    sort_key: Option<String>,

    /// Alternate sort keys, each becomes a local secondary index
    #[arg(long, conflicts_with = "no_lsi")]
    lsi: Vec<String>,

    /// Don't ask for local secondary indexes
    #[arg(long)]
    no_lsi: bool,

    /// Don't ask for a sort key
    #[arg(long)]
    no_sort: bool,

    /// Database engine of the cluster, MySQL or PostgreSQL
    #[arg(long)]
    engine: Option<String>,

    /// Database created with the cluster, named after the cluster by default
    #[arg(long)]
    initial_db: Option<String>,

    /// Existing parameter group of the cluster
    #[arg(long)]
    parameter_group: Option<String>,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            workspace: None,
            workload: None,
            storage: None,
        }
    }
}

struct InitRunner {
    command: InitCommand,
    ctx: Context,
    workspace: Option<Workspace>,
    workload: Option<String>,
    storage: Option<Storage>,
}

fn name_validator(kind: StorageType) -> fn(&str) -> eyre::Result<()> {
    match kind {
        StorageType::DynamoDB => validate::dynamo_table_name,
        StorageType::S3 => validate::s3_bucket_name,
        StorageType::Aurora => validate::aurora_cluster_name,
    }
}

impl InitRunner {
    fn kind(&self) -> Result<Option<StorageType>, Error> {
        self.command
            .kind
            .as_deref()
            .map(StorageType::parse)
            .transpose()
            .map_err(|e| self.error(Some("Invalid storage type"), Some(&e.to_string()), None))
    }

    fn has_table_flags(&self) -> bool {
        self.command.partition_key.is_some()
            || self.command.sort_key.is_some()
            || !self.command.lsi.is_empty()
            || self.command.no_lsi
            || self.command.no_sort
    }

    fn has_cluster_flags(&self) -> bool {
        self.command.engine.is_some()
            || self.command.initial_db.is_some()
            || self.command.parameter_group.is_some()
    }

    fn attribute(&self, value: &str, what: &str) -> Result<Attribute, Error> {
        Attribute::parse(value).map_err(|e| {
            self.error(Some(&format!("Invalid {what}")), Some(&e.to_string()), None)
        })
    }

    fn ask_kind(&self) -> eyre::Result<StorageType> {
        let choices = StorageType::ALL
            .iter()
            .map(|t| Choice::with_hint(t.as_str(), t.help()))
            .collect::<Vec<_>>();

        let picked = self
            .ctx
            .prompt
            .select_one("What type of storage would you like to create?", &choices)?;

        StorageType::parse(&picked)
    }

    fn ask_attribute(&self, message: &str) -> eyre::Result<Attribute> {
        let answer = self
            .ctx
            .prompt
            .get(message, None, &|v| validate::attribute(v).map(|_| ()))?;

        Attribute::parse(&answer)
    }

    fn ask_table(&self, name: String) -> eyre::Result<DynamoProps> {
        let partition_key = match &self.command.partition_key {
            Some(key) => Attribute::parse(key)?,
            None => self.ask_attribute("What is the partition key of the table? (name:S, name:N or name:B)")?,
        };

        let sort_key = match &self.command.sort_key {
            Some(key) => Some(Attribute::parse(key)?),
            None if self.command.no_sort => None,
            None => match self.ctx.prompt.confirm("Would you like to add a sort key?", false)? {
                true => Some(self.ask_attribute("What is the sort key of the table?")?),
                false => None,
            },
        };

        let lsi = match (&sort_key, self.command.lsi.is_empty()) {
            (None, _) => vec![],
            (Some(_), false) => self
                .command
                .lsi
                .iter()
                .map(|v| Attribute::parse(v))
                .collect::<eyre::Result<Vec<_>>>()?,
            (Some(_), true) if self.command.no_lsi => vec![],
            (Some(_), true) => {
                let mut lsi = vec![];

                while self.ctx.prompt.confirm(
                    "Would you like to add an alternate sort key?",
                    false,
                )? {
                    lsi.push(self.ask_attribute("What is the alternate sort key?")?);
                }

                lsi
            }
        };

        Ok(DynamoProps {
            name,
            partition_key,
            sort_key,
            lsi,
        })
    }

    fn ask_cluster(&self, name: String) -> eyre::Result<AuroraProps> {
        let engine = match &self.command.engine {
            Some(engine) => Engine::parse(engine)?,
            None => {
                let choices = Engine::ALL
                    .iter()
                    .map(|e| Choice::new(&e.to_string()))
                    .collect::<Vec<_>>();

                Engine::parse(
                    &self
                        .ctx
                        .prompt
                        .select_one("Which database engine would you like to use?", &choices)?,
                )?
            }
        };

        Ok(AuroraProps::new(
            &name,
            engine,
            self.command.initial_db.as_deref(),
            self.command.parameter_group.as_deref(),
        ))
    }
}

impl Runner for InitRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        let kind = self.kind()?;

        if let (Some(kind), Some(name)) = (kind, &self.command.name) {
            name_validator(kind)(name).map_err(|e| {
                self.error(Some("Invalid storage name"), Some(&e.to_string()), None)
            })?;
        }

        if let Some(key) = &self.command.partition_key {
            self.attribute(key, "partition key")?;
        }

        if let Some(key) = &self.command.sort_key {
            self.attribute(key, "sort key")?;
        }

        for key in &self.command.lsi {
            self.attribute(key, "alternate sort key")?;
        }

        if !self.command.lsi.is_empty() && self.command.no_sort {
            return Err(self.error(
                Some("Alternate sort keys need a sort key"),
                Some("Drop --no-sort or --lsi"),
                None,
            ));
        }

        if let Some(engine) = &self.command.engine {
            Engine::parse(engine)
                .map_err(|e| self.error(Some("Invalid engine"), Some(&e.to_string()), None))?;
        }

        match kind {
            Some(StorageType::DynamoDB) if self.has_cluster_flags() => Err(self.error(
                Some("Aurora flags don't apply to a DynamoDB table"),
                Some("--engine, --initial-db and --parameter-group are for Aurora only"),
                None,
            )),
            Some(StorageType::Aurora) if self.has_table_flags() => Err(self.error(
                Some("DynamoDB flags don't apply to an Aurora cluster"),
                Some("Key and index flags are for DynamoDB only"),
                None,
            )),
            Some(StorageType::S3) if self.has_table_flags() || self.has_cluster_flags() => {
                Err(self.error(
                    Some("An S3 bucket takes no other flags"),
                    Some("Pass only --name and --workload"),
                    None,
                ))
            }
            _ => Ok(()),
        }
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let workspace = self.ctx.workspace()?;

        let workload = match &self.command.workload {
            Some(workload) => workload.clone(),
            None => WorkspaceSelector::new(&workspace, self.ctx.prompt.as_ref())
                .workload("Which workload would you like to add the storage to?")?,
        };

        let manifest = workspace.read_workload(&workload)?;

        let kind = match self.kind()? {
            Some(kind) => kind,
            None => self.ask_kind()?,
        };

        if kind == StorageType::Aurora && manifest.kind == WorkloadType::RequestDrivenWebService {
            return Err(self.error(
                Some("Aurora is not available to this workload"),
                Some(&format!(
                    "{workload} is a {}, which can't reach a cluster in the VPC",
                    manifest.kind
                )),
                None,
            ));
        }

        let name = match &self.command.name {
            Some(name) => name.clone(),
            None => self.ctx.prompt.get(
                &format!("What would you like to name this {kind}?"),
                Some(&default_name(&workload, kind)),
                &name_validator(kind),
            )?,
        };

        let storage = match kind {
            StorageType::DynamoDB => Storage::DynamoDB(self.ask_table(name)?),
            StorageType::S3 => Storage::S3(S3Props { name }),
            StorageType::Aurora => Storage::Aurora(self.ask_cluster(name)?),
        };

        storage
            .validate()
            .map_err(|e| self.error(Some("Invalid storage"), Some(&e.to_string()), None))?;

        self.workspace = Some(workspace);
        self.workload = Some(workload);
        self.storage = Some(storage);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(workspace), Some(workload), Some(storage)) =
            (&self.workspace, &self.workload, &self.storage)
        else {
            return Err(self.error(Some("Nothing to create"), None, None));
        };

        let template = storage.template()?;

        let path = match workspace.write_addon(workload, storage.name(), &template) {
            Ok(path) => path,
            Err(e) if e.downcast_ref::<WorkspaceError>().is_some() => {
                return Err(self.error(
                    Some("Addon already exists"),
                    Some(&format!(
                        "{e}, pick another name or remove the file"
                    )),
                    None,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        println!(
            "{} {}",
            console::style("Wrote the addon at").green(),
            workspace.display(&path)
        );

        if let Some(parameter) = storage.parameters() {
            let path = workspace.write_addon_parameters(workload, &[parameter])?;

            println!(
                "{} {}",
                console::style("Added parameters to").green(),
                workspace.display(&path)
            );
        }

        let injected = addon::outputs(&template)?
            .into_iter()
            .filter(|o| matches!(o.kind, OutputKind::Variable | OutputKind::Secret))
            .map(|o| naming::env_var_name(&o.name))
            .collect::<Vec<_>>();

        if !injected.is_empty() {
            println!(
                "{} {}",
                console::style(format!("{workload} will get")).dim(),
                injected.join(", ")
            );
        }

        println!(
            "{}",
            console::style(format!(
                "Run `copilot svc deploy --name {workload}` (or `copilot job deploy`) to create the {}",
                storage_noun(storage)
            ))
            .dim()
        );

        Ok(())
    }
}

/// Name suggested in the prompt, valid for the storage type
fn default_name(workload: &str, kind: StorageType) -> String {
    match kind {
        StorageType::DynamoDB => format!("{workload}-table"),
        StorageType::S3 => format!("{workload}-bucket"),
        StorageType::Aurora => format!("{}cluster", AuroraProps::default_db_name(workload)),
    }
}

fn storage_noun(storage: &Storage) -> &'static str {
    match storage {
        Storage::DynamoDB(_) => "table",
        Storage::S3(_) => "bucket",
        Storage::Aurora(_) => "cluster",
    }
}
