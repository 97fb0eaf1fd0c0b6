use anyhow::Result;
use exswap::gl::{GlVersion, QuirkTable};
use exswap::Capabilities;

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub gl_version: GlVersion,
    pub quirks: QuirkTable,
}

#[cfg(target_os = "linux")]
pub fn run(settings: &ProbeSettings) -> Result<()> {
    use anyhow::Context;
    use exswap::native::{HeadlessContext, NativeGl};
    use exswap::GlExtra;

    let headless = HeadlessContext::create(settings.gl_version)
        .context("failed to create headless EGL context")?;
    let mut extra = GlExtra::with_quirks(
        NativeGl::new(),
        headless.platform().clone(),
        settings.quirks.clone(),
    );
    let resolver = |name: &str| headless.platform().proc_address(name);
    let caps = extra
        .init(&resolver)
        .context("external memory negotiation failed")?;
    print_capabilities(settings.gl_version, caps);
    extra.shutdown();
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn run(_settings: &ProbeSettings) -> Result<()> {
    anyhow::bail!("probing requires EGL and is only available on Linux")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn print_capabilities(requested: GlVersion, caps: &Capabilities) {
    println!("requested context: {requested}");
    println!("import context:    {}", caps.version);
    println!("vendor:            {}", caps.vendor);
    println!("device uuid:       {}", caps.device_uuid);
    println!("shared context:    {}", yes_no(caps.shared_context));
    println!("low capability:    {}", yes_no(caps.low_capability));
    if caps.low_capability {
        println!("tiling:            (not selected)");
    } else if caps.vendor_override {
        println!("tiling:            {} (vendor quirk)", caps.tiling);
    } else {
        println!("tiling:            {}", caps.tiling);
    }
}
