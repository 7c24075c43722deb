use clap::{Parser, Subcommand};
use weft_core::{
    compute_reputation, current_timestamp_ms, sign_edge, verify, Identity, IdentityStorage,
    LocalWitness, TrustEdge, TrustSignal, TrustStore, UNREACHABLE,
};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft - Decentralized Trust Graph CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Identity {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        load: bool,
        #[arg(short, long)]
        show: bool,
    },
    DeleteIdentity,
    ExportIdentity {
        path: String,
    },
    ImportIdentity {
        path: String,
    },
    Trust {
        agent_id: String,
        #[arg(short, long, default_value = "1.0")]
        weight: f32,
    },
    Untrust {
        agent_id: String,
    },
    Accept {
        agent_id: String,
    },
    Reject {
        agent_id: String,
    },
    Sign {
        trustee: String,
        #[arg(short, long, default_value = "1.0")]
        weight: f32,
        #[arg(short, long)]
        revoke: bool,
    },
    Verify {
        path: String,
    },
    Admit {
        path: String,
    },
    Distance {
        agent_id: String,
    },
    Stats,
}

fn main() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Identity { name, load, show } => handle_identity(name, load, show),
        Commands::DeleteIdentity => handle_delete_identity(),
        Commands::ExportIdentity { path } => handle_export_identity(&path),
        Commands::ImportIdentity { path } => handle_import_identity(&path),
        Commands::Trust { agent_id, weight } => handle_trust(&agent_id, weight),
        Commands::Untrust { agent_id } => handle_untrust(&agent_id),
        Commands::Accept { agent_id } => handle_accept(&agent_id),
        Commands::Reject { agent_id } => handle_reject(&agent_id),
        Commands::Sign {
            trustee,
            weight,
            revoke,
        } => handle_sign(&trustee, weight, revoke),
        Commands::Verify { path } => handle_verify(&path),
        Commands::Admit { path } => handle_admit(&path),
        Commands::Distance { agent_id } => handle_distance(&agent_id),
        Commands::Stats => handle_stats(),
    }
}

fn open_storage() -> Option<IdentityStorage> {
    match IdentityStorage::new() {
        Ok(s) => Some(s),
        Err(e) => {
            println!("Error initializing storage: {}", e);
            None
        }
    }
}

/// Rebuild the local trust store from persisted state: identity, the
/// direct-trust list, and the admitted signal log.
fn open_store(storage: &IdentityStorage) -> Option<(Identity, TrustStore)> {
    let identity = match storage.load() {
        Ok(id) => id,
        Err(_) => {
            println!("No stored identity found.");
            println!("Run 'weft identity' to create one.");
            return None;
        }
    };

    let mut store = TrustStore::new(identity.agent_id());

    match storage.load_trust_graph() {
        Ok(ids) => store.import_trust_graph(ids),
        Err(e) => {
            println!("Error loading trust graph: {}", e);
            return None;
        }
    }

    match storage.load_pending_requests() {
        Ok(ids) => store.import_pending_requests(ids),
        Err(e) => {
            println!("Error loading pending requests: {}", e);
            return None;
        }
    }

    // Replay the log in order so later revocations stay applied.
    match storage.load_signals() {
        Ok(signals) => store.bootstrap_from_log(&signals),
        Err(e) => {
            println!("Error loading signals: {}", e);
            return None;
        }
    }

    Some((identity, store))
}

fn print_identity(identity: &Identity) {
    println!("Agent ID:    {}", identity.agent_id());
    println!("Fingerprint: {}", identity.to_agent_info().fingerprint());
    if let Some(display_name) = identity.display_name() {
        println!("Name:        {}", display_name);
    }
}

fn handle_identity(name: Option<String>, load: bool, show: bool) {
    let Some(storage) = open_storage() else { return };

    if show {
        if !storage.has_stored_identity() {
            println!("No stored identity found.");
            println!("Run 'weft identity' to create a new one.");
            return;
        }

        match storage.load() {
            Ok(identity) => {
                println!("Stored Identity:\n");
                print_identity(&identity);
                println!("\nConfig directory: {}", storage.config_dir().display());
            }
            Err(e) => println!("Error loading identity: {}", e),
        }
        return;
    }

    if load {
        match storage.load_or_create() {
            Ok(mut identity) => {
                if let Some(n) = name {
                    identity.set_display_name(n);
                    if let Err(e) = storage.save(&identity) {
                        println!("Warning: Failed to save name: {}", e);
                    }
                }

                println!("Identity loaded:\n");
                print_identity(&identity);
            }
            Err(e) => println!("Error: {}", e),
        }
        return;
    }

    println!("Generating new identity...\n");

    let mut identity = Identity::generate().expect("Failed to generate identity");

    if let Some(n) = name {
        identity.set_display_name(n);
    }

    print_identity(&identity);

    println!("\nKey bytes (save securely):");
    println!("{}", hex::encode(identity.to_bytes()));

    match storage.save(&identity) {
        Ok(_) => println!(
            "\nIdentity saved to: {}/identity.bin",
            storage.config_dir().display()
        ),
        Err(e) => println!("\nWarning: Failed to save identity: {}", e),
    }
}

fn handle_delete_identity() {
    let Some(storage) = open_storage() else { return };

    match storage.delete() {
        Ok(_) => println!("Identity deleted."),
        Err(e) => println!("Error deleting identity: {}", e),
    }
}

fn handle_export_identity(path: &str) {
    let Some(storage) = open_storage() else { return };

    let identity = match storage.load() {
        Ok(id) => id,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };

    match storage.export_to_file(&identity, std::path::Path::new(path)) {
        Ok(_) => println!("Identity exported to {}", path),
        Err(e) => println!("Error exporting identity: {}", e),
    }
}

fn handle_import_identity(path: &str) {
    let Some(storage) = open_storage() else { return };

    match storage.import_from_file(std::path::Path::new(path)) {
        Ok(identity) => {
            if let Err(e) = storage.save(&identity) {
                println!("Error saving imported identity: {}", e);
                return;
            }
            println!("Identity imported:\n");
            print_identity(&identity);
        }
        Err(e) => println!("Error importing identity: {}", e),
    }
}

fn save_store(storage: &IdentityStorage, store: &TrustStore) -> bool {
    if let Err(e) = storage.save_trust_graph(&store.export_trust_graph()) {
        println!("Error saving trust graph: {}", e);
        return false;
    }
    if let Err(e) = storage.save_pending_requests(&store.export_pending_requests()) {
        println!("Error saving pending requests: {}", e);
        return false;
    }
    true
}

fn handle_trust(agent_id: &str, weight: f32) {
    let Some(storage) = open_storage() else { return };
    let Some((_, mut store)) = open_store(&storage) else { return };

    if let Err(e) = store.trust(agent_id, weight) {
        println!("Error: {}", e);
        return;
    }

    if save_store(&storage, &store) {
        println!("Now trusting {}", agent_id);
    }
}

fn handle_untrust(agent_id: &str) {
    let Some(storage) = open_storage() else { return };
    let Some((_, mut store)) = open_store(&storage) else { return };

    store.untrust(agent_id);

    if save_store(&storage, &store) {
        println!("No longer trusting {}", agent_id);
    }
}

fn handle_accept(agent_id: &str) {
    let Some(storage) = open_storage() else { return };
    let Some((_, mut store)) = open_store(&storage) else { return };

    if let Err(e) = store.accept_request(agent_id) {
        println!("Error: {}", e);
        return;
    }

    if save_store(&storage, &store) {
        println!("Accepted trust request from {}", agent_id);
    }
}

fn handle_reject(agent_id: &str) {
    let Some(storage) = open_storage() else { return };
    let Some((_, mut store)) = open_store(&storage) else { return };

    store.reject_request(agent_id);

    if save_store(&storage, &store) {
        println!("Rejected trust request from {}", agent_id);
    }
}

fn handle_sign(trustee: &str, weight: f32, revoke: bool) {
    let Some(storage) = open_storage() else { return };
    let identity = match storage.load() {
        Ok(id) => id,
        Err(_) => {
            println!("No stored identity found.");
            println!("Run 'weft identity' to create one.");
            return;
        }
    };

    let edge = TrustEdge {
        truster: identity.agent_id(),
        trustee: trustee.to_string(),
        weight: if revoke { 0.0 } else { weight },
        timestamp: current_timestamp_ms(),
        revoked: revoke,
    };

    match sign_edge(&identity, &edge, &LocalWitness) {
        Ok(signal) => match serde_json::to_string_pretty(&signal) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("Error serializing signal: {}", e),
        },
        Err(e) => println!("Error: {}", e),
    }
}

fn read_signal(path: &str) -> Option<TrustSignal> {
    let json = match std::fs::read_to_string(path) {
        Ok(j) => j,
        Err(e) => {
            println!("Error reading {}: {}", path, e);
            return None;
        }
    };

    match serde_json::from_str(&json) {
        Ok(signal) => Some(signal),
        Err(e) => {
            println!("Error parsing signal: {}", e);
            None
        }
    }
}

fn handle_verify(path: &str) {
    let Some(signal) = read_signal(path) else { return };

    if verify(&signal) {
        println!("VALID");
        println!("Truster: {}", signal.truster);
        println!("Trustee: {}", signal.trustee);
        println!(
            "Kind:    {}",
            if signal.is_revocation() { "revocation" } else { "trust" }
        );
    } else {
        println!("INVALID");
    }
}

fn handle_admit(path: &str) {
    let Some(storage) = open_storage() else { return };
    let Some((_, mut store)) = open_store(&storage) else { return };
    let Some(signal) = read_signal(path) else { return };

    if let Err(e) = store.admit(&signal) {
        println!("Rejected: {}", e);
        return;
    }

    let mut signals = match storage.load_signals() {
        Ok(s) => s,
        Err(e) => {
            println!("Error loading signal log: {}", e);
            return;
        }
    };
    signals.push(signal);

    match storage.save_signals(&signals) {
        Ok(_) => println!("Admitted."),
        Err(e) => println!("Error saving signal log: {}", e),
    }

    save_store(&storage, &store);
}

fn handle_distance(agent_id: &str) {
    let Some(storage) = open_storage() else { return };
    let Some((_, store)) = open_store(&storage) else { return };

    let distance = store.graph_distance(agent_id);
    let reputation = compute_reputation(&store, agent_id);

    if distance == UNREACHABLE {
        println!("Distance: unreachable (beyond {} hops)", store.max_hops());
    } else {
        println!("Distance: {}", distance);
    }
    println!("Visible:  {}", reputation.visible);
    println!("Weight:   {:.2}", reputation.weight());
}

fn handle_stats() {
    let Some(storage) = open_storage() else { return };
    let Some((identity, store)) = open_store(&storage) else { return };

    let stats = store.stats();
    println!("Agent ID:        {}", identity.agent_id());
    println!("Direct trust:    {}", stats.direct_trust_size);
    println!("Adjacency edges: {}", stats.adjacency_size);
    println!("Cached agents:   {}", stats.cache_size);
    println!("Max hops:        {}", store.max_hops());
    println!("Pending requests: {}", store.pending_requests().len());
}
