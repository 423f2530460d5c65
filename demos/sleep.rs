use std::time::Instant;

fn main() {
    nap::block_on(async {
        let start = Instant::now();
        nap::sleep(1000).await;
        println!("slept for {:?}", start.elapsed());
    });
}
