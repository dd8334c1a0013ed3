/// Display version information
pub fn execute() {
    println!("daopool {}", env!("CARGO_PKG_VERSION"));
    println!("Pools, crowdsales and token-weighted governance on a local node");
    println!(
        "Snapshot format v{}",
        daopool::serialization::SNAPSHOT_VERSION
    );
}
