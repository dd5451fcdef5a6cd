use datafusion::arrow::record_batch::RecordBatch;
use datafusion::prelude::col;
use std::fs;
use std::path::{Path, PathBuf};
use warehouse_bootstrap::config::{JobConfig, RuntimeConfig};
use warehouse_bootstrap::db::NewTable;
use warehouse_bootstrap::service::bootstrap;
use warehouse_bootstrap::types::{DatabaseName, QualifiedName, TableName};
use warehouse_bootstrap::{WarehouseError, WarehouseSession};

const CAR_SALES: &str = "customer_id,model,saleprice,sale_date,VIN\n\
    1,Model C,120000.0,2019-03-07,5YJ3E1EA0KF000001\n\
    2,Model D,220000.5,2019-03-08,5YJ3E1EA0KF000002\n\
    3,Model R,90000.0,2019-03-09,5YJ3E1EA0KF000003\n";
const CAR_INSTALLS: &str = "model,VIN,serial_no,timestamp\n\
    Model C,5YJ3E1EA0KF000001,S-100,2019-02-01 10:00:00\n\
    Model D,5YJ3E1EA0KF000002,S-101,2019-02-02 11:30:00\n";
const CUSTOMER_DATA: &str = "customer_id,username,name,gender,email,occupation,zip\n\
    1,jsmith,John Smith,M,js@example.com,Engineer,94105\n\
    2,adoe,Anna Doe,F,ad@example.com,Teacher,10001\n\
    3,rroe,Rick Roe,M,rr@example.com,Chef,60601\n\
    4,mlee,Mia Lee,F,ml@example.com,Nurse,73301\n";
const EXPERIMENTAL_MOTORS: &str = "serial_no,factory_no,machine_no,part_no,status\n\
    S-100,1,12,P-9,pass\n";
const POSTAL_CODES: &str = "zip,city,state,latitude,longitude\n\
    94105,San Francisco,CA,37.78,-122.39\n\
    10001,New York,NY,40.75,-73.99\n\
    60601,Chicago,IL,41.88,-87.62\n\
    73301,Austin,TX,30.27,-97.74\n\
    02108,Boston,MA,42.35,-71.06\n";

struct Fixture {
    _dir: tempfile::TempDir,
    bucket: PathBuf,
    config_path: PathBuf,
    runtime: RuntimeConfig,
}

impl Fixture {
    fn new(prefix: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bucket = dir.path().join("bucket");
        fs::create_dir_all(&bucket).unwrap();
        for (name, body) in [
            ("car_sales.csv", CAR_SALES),
            ("car_installs.csv", CAR_INSTALLS),
            ("customer_data.csv", CUSTOMER_DATA),
            ("experimental_motors.csv", EXPERIMENTAL_MOTORS),
            ("postal_codes.csv", POSTAL_CODES),
        ] {
            fs::write(bucket.join(name), body).unwrap();
        }

        let config_path = dir.path().join("cde_examples.ini");
        fs::write(
            &config_path,
            format!(
                "[CDE-examples]\ns3BucketPath=\"{}\"\nuserPrefix=\"{prefix}\"\n",
                bucket.display()
            ),
        )
        .unwrap();

        let runtime = RuntimeConfig {
            config_path: config_path.clone(),
            warehouse_dir: dir.path().join("warehouse"),
            ..RuntimeConfig::default()
        };
        Self {
            _dir: dir,
            bucket,
            config_path,
            runtime,
        }
    }

    async fn session(&self) -> WarehouseSession {
        WarehouseSession::builder()
            .warehouse_dir(&self.runtime.warehouse_dir)
            .create()
            .await
            .expect("session")
    }
}

fn qualified(db: &str, table: &str) -> QualifiedName {
    QualifiedName::new(
        DatabaseName::new(db).unwrap(),
        TableName::new(table).unwrap(),
    )
}

async fn sorted_rows(
    session: &WarehouseSession,
    name: &QualifiedName,
    key: &str,
) -> Vec<RecordBatch> {
    session
        .table(name)
        .await
        .unwrap()
        .sort(vec![col(key).sort(true, false)])
        .unwrap()
        .collect()
        .await
        .unwrap()
}

fn csv_rows(body: &str) -> usize {
    body.lines().skip(1).filter(|l| !l.is_empty()).count()
}

fn csv_header(body: &str) -> Vec<String> {
    body.lines()
        .next()
        .unwrap()
        .split(',')
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn populates_every_table_from_its_csv() {
    let fx = Fixture::new("DEMO");
    let job = JobConfig::load(&fx.config_path).unwrap();
    let report = bootstrap::run(&job, &fx.runtime).await.unwrap();

    assert_eq!(report.app_name, "Ingest-DEMO");
    assert!(report.dropped.is_empty());
    let created: Vec<&str> = report.created.iter().map(|n| n.as_str()).collect();
    assert_eq!(created, vec!["DEMO_SALES", "DEMO_FACTORY", "DEMO_MARKETING"]);
    let written: Vec<String> = report.tables.iter().map(|t| t.name.to_string()).collect();
    assert_eq!(
        written,
        vec![
            "DEMO_SALES.CAR_SALES",
            "DEMO_FACTORY.CAR_INSTALLS",
            "DEMO_FACTORY.EXPERIMENTAL_MOTORS",
            "DEMO_MARKETING.CUSTOMER_DATA",
            "DEMO_MARKETING.GEO_DATA_XREF",
        ]
    );

    let session = fx.session().await;
    for (db, table, body) in [
        ("DEMO_SALES", "CAR_SALES", CAR_SALES),
        ("DEMO_FACTORY", "CAR_INSTALLS", CAR_INSTALLS),
        ("DEMO_FACTORY", "EXPERIMENTAL_MOTORS", EXPERIMENTAL_MOTORS),
        ("DEMO_MARKETING", "CUSTOMER_DATA", CUSTOMER_DATA),
        ("DEMO_MARKETING", "GEO_DATA_XREF", POSTAL_CODES),
    ] {
        let name = qualified(db, table);
        let entry = session.describe_table(&name).await.unwrap();
        assert_eq!(entry.row_count as usize, csv_rows(body), "{name}");
        let columns: Vec<String> = entry.columns.iter().map(|c| c.name.clone()).collect();
        assert_eq!(columns, csv_header(body), "{name}");

        let scanned = session.table(&name).await.unwrap().count().await.unwrap();
        assert_eq!(scanned, csv_rows(body), "{name}");
    }

    let databases: Vec<String> = session
        .list_databases()
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(databases, vec!["DEMO_FACTORY", "DEMO_MARKETING", "DEMO_SALES"]);
}

#[tokio::test]
async fn second_run_yields_identical_tables() {
    let fx = Fixture::new("DEMO");
    let job = JobConfig::load(&fx.config_path).unwrap();
    let sales = qualified("DEMO_SALES", "CAR_SALES");
    let geo = qualified("DEMO_MARKETING", "GEO_DATA_XREF");

    bootstrap::run(&job, &fx.runtime).await.unwrap();
    let session = fx.session().await;
    let first_sales = sorted_rows(&session, &sales, "customer_id").await;
    let first_geo = sorted_rows(&session, &geo, "zip").await;
    drop(session);

    let report = bootstrap::run(&job, &fx.runtime).await.unwrap();
    assert_eq!(report.dropped.len(), 3);

    let session = fx.session().await;
    assert_eq!(sorted_rows(&session, &sales, "customer_id").await, first_sales);
    assert_eq!(sorted_rows(&session, &geo, "zip").await, first_geo);
}

#[tokio::test]
async fn previous_contents_of_same_named_databases_are_gone() {
    let fx = Fixture::new("DEMO");
    let session = fx.session().await;
    let sales = DatabaseName::new("DEMO_SALES").unwrap();
    session.create_database(&sales).await.unwrap();
    let db = session
        .catalog()
        .get_database("DEMO_SALES")
        .await
        .unwrap()
        .unwrap();
    let stale_dir = db.location.join("OLD_REPORT");
    fs::create_dir_all(&stale_dir).unwrap();
    session
        .catalog()
        .upsert_table(NewTable {
            database_id: db.id,
            name: "OLD_REPORT".to_string(),
            location: stale_dir.clone(),
            format: "parquet".to_string(),
            row_count: 0,
            columns: vec![],
        })
        .await
        .unwrap();
    drop(session);

    let job = JobConfig::load(&fx.config_path).unwrap();
    let report = bootstrap::run(&job, &fx.runtime).await.unwrap();
    let dropped: Vec<&str> = report.dropped.iter().map(|n| n.as_str()).collect();
    assert_eq!(dropped, vec!["DEMO_SALES"]);

    let session = fx.session().await;
    let tables: Vec<String> = session
        .list_tables(&sales)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(tables, vec!["CAR_SALES"]);
    assert!(!stale_dir.exists());
}

#[tokio::test]
async fn missing_setting_fails_before_any_database_operation() {
    for (key, ini) in [
        ("userPrefix", "[CDE-examples]\ns3BucketPath={bucket}\n"),
        ("s3BucketPath", "[CDE-examples]\nuserPrefix=DEMO\n"),
    ] {
        let fx = Fixture::new("DEMO");
        let bucket = fx.bucket.display().to_string();
        fs::write(&fx.config_path, ini.replace("{bucket}", &bucket)).unwrap();

        let err = bootstrap::run_configured(&fx.runtime).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Config(_)), "{key}: {err}");
        assert!(!fx.runtime.warehouse_dir.exists(), "{key}");
    }
}

#[tokio::test]
async fn configured_run_reads_settings_from_the_file() {
    let fx = Fixture::new("DEMO");
    let report = bootstrap::run_configured(&fx.runtime).await.unwrap();
    assert_eq!(report.app_name, "Ingest-DEMO");
    assert_eq!(report.tables.len(), 5);
}

#[tokio::test]
async fn unreadable_source_leaves_existing_databases_untouched() {
    let fx = Fixture::new("DEMO");
    let job = JobConfig::load(&fx.config_path).unwrap();
    bootstrap::run(&job, &fx.runtime).await.unwrap();

    fs::remove_file(fx.bucket.join("postal_codes.csv")).unwrap();
    let err = bootstrap::run(&job, &fx.runtime).await.unwrap_err();
    assert!(matches!(err, WarehouseError::SourceNotFound(_)));

    let session = fx.session().await;
    let entry = session
        .describe_table(&qualified("DEMO_MARKETING", "GEO_DATA_XREF"))
        .await
        .unwrap();
    assert_eq!(entry.row_count as usize, csv_rows(POSTAL_CODES));
}

#[tokio::test]
async fn prefixes_isolate_tenants() {
    let fx = Fixture::new("alice");
    let job = JobConfig::load(&fx.config_path).unwrap();
    bootstrap::run(&job, &fx.runtime).await.unwrap();

    let bob = JobConfig {
        user_prefix: "bob".to_string(),
        ..job.clone()
    };
    bootstrap::run(&bob, &fx.runtime).await.unwrap();

    let session = fx.session().await;
    assert_eq!(session.list_databases().await.unwrap().len(), 6);
    assert!(
        session
            .describe_table(&qualified("alice_SALES", "CAR_SALES"))
            .await
            .is_ok()
    );
}

#[test]
fn fixture_bucket_is_a_plain_path() {
    let fx = Fixture::new("DEMO");
    let job = JobConfig::load(&fx.config_path).unwrap();
    assert_eq!(Path::new(&job.s3_bucket_path), fx.bucket.as_path());
}
