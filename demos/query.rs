use mcq::{Conf, QueryErr};

fn main() -> Result<(), QueryErr> {
    let server = Conf::create_with_port("www.example.com", 25565);
    let mut client = server.connect()?;

    println!("{}", client.simple()?);

    let full = client.full()?;

    println!("{}", full);

    if let Some(plugin) = full.plugins() {
        println!("{}", plugin);
    }

    Ok(())
}
