use crate::upload::{check, Error, Uploader, URL_PREFIX};
use axum::body::Bytes;
use futures_util::stream;

fn chunks(
    parts: &[&'static [u8]],
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> {
    stream::iter(
        parts
            .iter()
            .map(|p| Ok::<_, std::io::Error>(Bytes::from_static(*p)))
            .collect::<Vec<_>>(),
    )
}

fn files_in(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn capability_table() {
    assert_eq!(check("a.jpg", "image/jpeg").unwrap(), "jpg");
    assert_eq!(check("a.JPEG", "image/jpeg").unwrap(), "JPEG");
    assert_eq!(check("clip.mov", "video/quicktime").unwrap(), "mov");
    assert_eq!(check("clip.avi", "video/x-msvideo").unwrap(), "avi");
    assert!(check("a.webp", "image/webp; charset=binary").is_ok());

    assert!(matches!(check("a.txt", "text/plain"), Err(Error::Extension(_))));
    assert!(matches!(check("noext", "image/png"), Err(Error::Extension(_))));
    assert!(matches!(check("a.png", "text/plain"), Err(Error::ContentType(_))));
    assert!(matches!(check("a.png", ""), Err(Error::ContentType(_))));
    assert!(matches!(
        check("a.png", "video/mp4"),
        Err(Error::KindMismatch { .. })
    ));
}

#[tokio::test]
async fn accept_stores_file() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = Uploader::open(dir.path().join("uploads"), 1024)
        .await
        .unwrap();

    let file = uploader
        .accept("../../evil/photo.png", "image/png", chunks(&[b"\x89PNG", b"rest"]))
        .await
        .unwrap();

    assert_eq!(file.size, 8);
    assert!(file.name.ends_with(".png"));
    assert!(!file.name.contains('/'));
    assert_eq!(file.url, format!("{URL_PREFIX}/{}", file.name));
    assert_eq!(
        std::fs::read(uploader.dir().join(&file.name)).unwrap(),
        b"\x89PNGrest"
    );

    assert!(uploader.remove(&file.url).await.unwrap());
    assert!(!uploader.remove(&file.url).await.unwrap());
    assert_eq!(files_in(uploader.dir()), 0);
}

#[tokio::test]
async fn rejected_uploads_leave_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = Uploader::open(dir.path().join("uploads"), 8).await.unwrap();

    assert!(matches!(
        uploader
            .accept("notes.txt", "text/plain", chunks(&[b"hello"]))
            .await,
        Err(Error::Extension(_))
    ));

    assert!(matches!(
        uploader
            .accept("big.mp4", "video/mp4", chunks(&[b"12345", b"67890"]))
            .await,
        Err(Error::TooLarge(8))
    ));

    let broken = stream::iter(vec![
        Ok(Bytes::from_static(b"1234")),
        Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
    ]);
    assert!(matches!(
        uploader.accept("clip.webm", "video/webm", broken).await,
        Err(Error::Interrupted(_))
    ));

    assert_eq!(files_in(uploader.dir()), 0);
}

#[tokio::test]
async fn exact_limit_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = Uploader::open(dir.path().join("uploads"), 8).await.unwrap();

    let file = uploader
        .accept("a.gif", "image/gif", chunks(&[b"GIF8", b"9a;;"]))
        .await
        .unwrap();
    assert_eq!(file.size, 8);
}
