use dbkeeper::config::{keys, MapSource};
use dbkeeper::definition::{self, PROJECT_LABEL};
use dbkeeper::{ConfigResolver, Configuration, VolumeState};
use tempfile::TempDir;

fn config(dir: &TempDir, extra: &[(&str, &str)]) -> Configuration {
    let mut source = MapSource::from_pairs([
        (keys::ROOT_PASSWORD, "r00t-Secret!"),
        (keys::DATABASE, "shop"),
        (keys::USER, "shop_app"),
        (keys::PASSWORD, "App-Secret?"),
        (keys::PROJECT, "shop"),
    ]);
    for (key, value) in extra {
        source = source.with(key, value);
    }
    ConfigResolver::new(dir.path()).resolve(&source).unwrap()
}

#[test]
fn test_build_is_pure() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, &[(keys::MEMORY, "1g"), (keys::PORT, "3307")]);

    let a = definition::build(&config);
    let b = definition::build(&config);

    assert_eq!(a, b);
    assert_eq!(a.render_run_args(), b.render_run_args());
}

#[test]
fn test_run_args_never_contain_secret_values() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, &[]);
    let args = definition::build(&config).render_run_args();
    let joined = args.join(" ");

    assert!(!joined.contains("r00t-Secret!"), "{}", joined);
    assert!(!joined.contains("App-Secret?"), "{}", joined);
    // Secrets are named but valued through the runtime's environment.
    assert!(args.windows(2).any(|w| w == ["-e", "MYSQL_ROOT_PASSWORD"]));
    assert!(args.windows(2).any(|w| w == ["-e", "MYSQL_PASSWORD"]));
    assert!(args.windows(2).any(|w| w == ["-e", "MYSQL_DATABASE=shop"]));
}

#[test]
fn test_run_args_layout() {
    let dir = TempDir::new().unwrap();
    let config = config(
        &dir,
        &[
            (keys::PORT, "3307"),
            (keys::SERVER_ARGS, "--character-set-server=utf8mb4"),
        ],
    );
    let args = definition::build(&config).render_run_args();

    assert_eq!(&args[..4], ["run", "-d", "--name", "shop-db"]);
    assert!(args.windows(2).any(|w| w == ["--network", "shop-net"]));
    assert!(args.windows(2).any(|w| w == ["-p", "3307:3306/tcp"]));
    let data = format!("{}:/var/lib/mysql", dir.path().join("data").display());
    assert!(args.windows(2).any(|w| w[0] == "-v" && w[1] == data));
    assert!(args
        .windows(2)
        .any(|w| w[0] == "--label" && w[1] == format!("{}=shop", PROJECT_LABEL)));
    assert_eq!(
        &args[args.len() - 2..],
        ["mysql:8.4", "--character-set-server=utf8mb4"]
    );
}

#[test]
fn test_init_mount_only_for_empty_volume() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("initdb")).unwrap();
    let config = config(&dir, &[(keys::INIT_SCRIPTS, "initdb")]);
    let base = definition::build(&config);

    let fresh = base.for_volume(VolumeState::Empty);
    let mount = fresh.init_mount().unwrap();
    assert_eq!(mount.target, "/docker-entrypoint-initdb.d");
    assert!(mount.read_only);
    assert_eq!(fresh, base);

    let reused = base.for_volume(VolumeState::Initialized);
    assert!(reused.init_mount().is_none());
    assert!(!reused.render_run_args().iter().any(|a| a.contains("docker-entrypoint-initdb.d")));
}

#[test]
fn test_mariadb_uses_its_own_variables() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, &[(keys::ENGINE, "mariadb")]);
    let args = definition::build(&config).render_run_args();

    assert!(args.iter().any(|a| a == "MARIADB_ROOT_PASSWORD"));
    assert!(args.iter().any(|a| a == "MARIADB_USER=shop_app"));
    assert!(args.contains(&"mariadb:11.4".to_string()));
}
