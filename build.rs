fn main() {
    // ── macOS: embed Info.plist so CoreBluetooth grants Bluetooth access ──────
    //
    // CBCentralManager silently refuses to scan (state stays "unauthorised")
    // unless the running binary carries an Info.plist with
    // NSBluetoothAlwaysUsageDescription. For a CLI tool the plist goes into
    // the __TEXT,__info_plist section of the Mach-O binary via -sectcreate;
    // macOS reads it exactly as it would an App Bundle's Info.plist.
    //
    // CARGO_CFG_TARGET_OS reflects the *target*, so cross-compiling from
    // Linux to macOS is handled correctly too.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("macos") {
        let dir = std::env::var("CARGO_MANIFEST_DIR")
            .expect("CARGO_MANIFEST_DIR must be set by Cargo");

        let plist = format!("{dir}/Info.plist");

        println!("cargo:rustc-link-arg=-sectcreate");
        println!("cargo:rustc-link-arg=__TEXT");
        println!("cargo:rustc-link-arg=__info_plist");
        println!("cargo:rustc-link-arg={plist}");

        println!("cargo:rerun-if-changed=Info.plist");
    }
}
