use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use threadline_api::{Comment, CommentId, PostId};

const POST_ID: &str = "1";
const NUM_COMMENTS: usize = 200;
const NUM_AUTHORS: usize = 8;

const AUTHOR_WORD_COUNT: usize = 2;
const COMMENT_MIN_WORDS: usize = 5;
const COMMENT_MAX_WORDS: usize = 60;

// one in DELETED_ONE_IN comments is a tombstone
const DELETED_ONE_IN: u32 = 15;
// replies go to the newest comment this often, making long chains
const CHAIN_PERCENT: u32 = 40;

fn main() -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    let authors = (0..NUM_AUTHORS)
        .map(|_| lipsum::lipsum_words(AUTHOR_WORD_COUNT))
        .collect::<Vec<_>>();

    let mut date = Utc::now() - Duration::days(30);
    let mut comments: Vec<Comment> = Vec::with_capacity(NUM_COMMENTS);
    for i in 0..NUM_COMMENTS {
        let parent_id = match comments.last() {
            None => None,
            Some(last) if rng.gen_ratio(CHAIN_PERCENT, 100) => Some(last.id.clone()),
            Some(_) if rng.gen_bool(0.3) => None,
            Some(_) => comments.choose(&mut rng).map(|c| c.id.clone()),
        };
        let deleted = rng.gen_ratio(1, DELETED_ONE_IN);
        date = date + Duration::minutes(rng.gen_range(1..240));
        comments.push(Comment {
            id: CommentId((i + 1).to_string()),
            post_id: PostId(String::from(POST_ID)),
            parent_id,
            author: authors.choose(&mut rng).cloned().unwrap_or_default(),
            date,
            content: match deleted {
                true => String::from(threadline_api::DELETED_COMMENT_CONTENT),
                false => lipsum::lipsum_words(rng.gen_range(COMMENT_MIN_WORDS..COMMENT_MAX_WORDS)),
            },
            deleted,
        });
    }

    serde_json::to_writer_pretty(std::io::stdout(), &comments)?;
    println!();
    Ok(())
}
