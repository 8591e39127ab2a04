fn main() {
    // Shaders are embedded with include_str!
    println!("cargo:rerun-if-changed=shaders/fluid");
}
