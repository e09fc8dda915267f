fn main() {
    if let Err(e) = wxdispatch::run() {
        tracing::error!(error = %e, "wxdispatch exited with an error");
        eprintln!("wxdispatch: {e}");
        std::process::exit(1);
    }
}
