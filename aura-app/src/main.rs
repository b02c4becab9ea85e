fn main() -> anyhow::Result<()> {
    aura_app_lib::run()
}
