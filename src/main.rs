fn main() -> anyhow::Result<()> {
    shoe_stock_lib::run()
}
