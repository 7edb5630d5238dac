use super::*;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        mod web_host;
        pub use web_host::*;
    } else {
        mod desktop_host;
        pub use desktop_host::*;
    }
}
